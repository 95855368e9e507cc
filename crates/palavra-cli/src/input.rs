// Line input handling and command dispatch.
//
// Translates one line typed at the prompt into either a UserCommand for the
// session orchestrator or a request handled locally by the console.

use palavra_app::protocol::UserCommand;

/// What a typed line means.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Forward to the session orchestrator.
    Command(UserCommand),
    /// Print the command list; nothing is sent.
    Help,
}

/// Parse one line from the prompt.
///
/// Lines beginning with `:` are console commands. Everything else, blank
/// lines included, is an answer; the orchestrator rejects blank ones itself.
pub fn parse_line(line: &str) -> Input {
    let line = line.trim_end_matches(['\r', '\n']);

    match line.trim() {
        ":next" | ":n" => Input::Command(UserCommand::LoadNextTerm),
        ":phrase" | ":p" => Input::Command(UserCommand::GeneratePhrase),
        ":theme" | ":t" => Input::Command(UserCommand::TogglePreference),
        ":quit" | ":q" => Input::Command(UserCommand::Quit),
        ":help" | ":h" | ":?" => Input::Help,
        _ => Input::Command(UserCommand::SubmitAnswer(line.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(line: &str) -> UserCommand {
        match parse_line(line) {
            Input::Command(cmd) => cmd,
            Input::Help => panic!("{line:?} parsed as help"),
        }
    }

    #[test]
    fn short_and_long_forms_match() {
        assert_eq!(command(":next"), UserCommand::LoadNextTerm);
        assert_eq!(command(":n"), UserCommand::LoadNextTerm);
        assert_eq!(command(":phrase"), UserCommand::GeneratePhrase);
        assert_eq!(command(":p"), UserCommand::GeneratePhrase);
        assert_eq!(command(":theme"), UserCommand::TogglePreference);
        assert_eq!(command(":t"), UserCommand::TogglePreference);
        assert_eq!(command(":quit"), UserCommand::Quit);
        assert_eq!(command(":q"), UserCommand::Quit);
    }

    #[test]
    fn commands_tolerate_surrounding_whitespace() {
        assert_eq!(command("  :n  \n"), UserCommand::LoadNextTerm);
        assert_eq!(command(":q\r\n"), UserCommand::Quit);
    }

    #[test]
    fn help_is_local() {
        assert_eq!(parse_line(":help"), Input::Help);
        assert_eq!(parse_line(":?"), Input::Help);
    }

    #[test]
    fn plain_text_is_an_answer() {
        assert_eq!(
            command("lasting a very short time\n"),
            UserCommand::SubmitAnswer("lasting a very short time".into())
        );
    }

    #[test]
    fn blank_line_is_forwarded_as_empty_answer() {
        assert_eq!(command("\n"), UserCommand::SubmitAnswer(String::new()));
        assert_eq!(command("   "), UserCommand::SubmitAnswer("   ".into()));
    }

    #[test]
    fn unknown_colon_word_is_an_answer() {
        assert_eq!(
            command(":ephemeral"),
            UserCommand::SubmitAnswer(":ephemeral".into())
        );
    }
}
