//! Keyword and phrase matchers over raw output chunks.

/// Keywords that mark a chunk as error output (matched case-insensitively).
pub const ERROR_KEYWORDS: [&str; 3] = ["error", "exception", "err!"];

/// Prompt fragments of interactive yes/no questions.
pub const CONFIRMATION_PROMPTS: [&str; 2] = ["y/N", "Yes/no"];

pub fn is_error_output(chunk: &str) -> bool {
    let lower = chunk.to_lowercase();
    ERROR_KEYWORDS.iter().any(|k| lower.contains(k))
}

pub fn needs_confirmation(chunk: &str) -> bool {
    CONFIRMATION_PROMPTS.iter().any(|p| chunk.contains(p))
}

pub fn is_build_success<S: AsRef<str>>(chunk: &str, phrases: &[S]) -> bool {
    phrases.iter().any(|p| chunk.contains(p.as_ref()))
}

/// Package-manager "run" invocations (`npm run dev`, `pnpm run build`, ...).
pub fn is_run_command<S: AsRef<str>>(command: &str, markers: &[S]) -> bool {
    markers.iter().any(|m| command.contains(m.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_keywords() {
        assert!(is_error_output("FATAL error: boom"));
        assert!(is_error_output("Uncaught Exception in main"));
        assert!(is_error_output("npm ERR! code ENOENT"));
        assert!(is_error_output("TypeError: x is undefined"));
        assert!(!is_error_output("added 42 packages"));
    }

    #[test]
    fn test_confirmation_prompts() {
        assert!(needs_confirmation("Overwrite existing files? (y/N) "));
        assert!(needs_confirmation("Proceed? [Yes/no]"));
        assert!(!needs_confirmation("yes or no?"));
    }

    #[test]
    fn test_build_success() {
        let phrases = ["Compiled successfully", "Build completed"];
        assert!(is_build_success("webpack: Compiled successfully in 1.2s", &phrases));
        assert!(is_build_success("Build completed.", &phrases));
        assert!(!is_build_success("compiled with warnings", &phrases));
    }

    #[test]
    fn test_run_command() {
        let markers = ["npm run", "yarn run", "pnpm run"];
        assert!(is_run_command("npm run dev", &markers));
        assert!(is_run_command("cd app && pnpm run start", &markers));
        assert!(!is_run_command("npm install", &markers));
        assert!(!is_run_command("yarn dev", &markers));
    }
}
