use crate::domain::ports::Prompter;
use crate::utils::error::{PermitError, Result};
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::str::FromStr;

/// Reads answers from stdin, one line per question.
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&mut self, question: &str) -> Result<String> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{}", question)?;
        stdout.flush()?;

        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(PermitError::InvalidInput {
                message: "input closed before an answer was given".to_string(),
            });
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn say(&mut self, message: &str) {
        println!("{}", message);
    }
}

/// Canned answers, for tests and non-interactive runs.
#[derive(Debug, Default, Clone)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub questions: Vec<String>,
    pub transcript: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            questions: Vec::new(),
            transcript: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    pub fn said(&self, needle: &str) -> bool {
        self.transcript.iter().any(|line| line.contains(needle))
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str) -> Result<String> {
        self.questions.push(question.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| PermitError::InvalidInput {
                message: format!("no scripted answer for '{}'", question.trim()),
            })
    }

    fn say(&mut self, message: &str) {
        self.transcript.push(message.to_string());
    }
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

pub fn ask_yes_no<P: Prompter + ?Sized>(prompter: &mut P, question: &str) -> Result<bool> {
    Ok(is_yes(&prompter.ask(question)?))
}

/// Re-asks until the answer parses.
pub fn ask_parsed<T, P>(prompter: &mut P, question: &str, retry_message: &str) -> Result<T>
where
    T: FromStr,
    P: Prompter + ?Sized,
{
    loop {
        let answer = prompter.ask(question)?;
        match answer.trim().parse::<T>() {
            Ok(value) => return Ok(value),
            Err(_) => prompter.say(retry_message),
        }
    }
}

/// Matches an answer against `options`, accepting an exact match or a prefix
/// ("n" for "new").
pub fn match_option<'a>(answer: &str, options: &'a [String]) -> Option<&'a str> {
    let answer = answer.trim().to_lowercase();
    if answer.is_empty() {
        return None;
    }
    options
        .iter()
        .find(|opt| opt.to_lowercase() == answer)
        .or_else(|| options.iter().find(|opt| opt.to_lowercase().starts_with(&answer)))
        .map(String::as_str)
}

pub fn ask_choice<P: Prompter + ?Sized>(
    prompter: &mut P,
    question: &str,
    options: &[String],
) -> Result<String> {
    loop {
        let answer = prompter.ask(question)?;
        if let Some(option) = match_option(&answer, options) {
            return Ok(option.to_string());
        }
        prompter.say("Invalid input. Try again.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("n"));
        assert!(!is_yes(""));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn test_ask_parsed_retries_until_valid() {
        let mut prompter = ScriptedPrompter::new(["abc", "", "1250.50"]);
        let cost: f64 = ask_parsed(&mut prompter, "Cost: ", "Invalid number, try again.").unwrap();
        assert_eq!(cost, 1250.5);
        assert_eq!(prompter.questions.len(), 3);
        assert_eq!(prompter.transcript.len(), 2);
    }

    #[test]
    fn test_match_option_prefers_exact_then_prefix() {
        let options = vec!["new".to_string(), "replace".to_string()];
        assert_eq!(match_option("new", &options), Some("new"));
        assert_eq!(match_option("R", &options), Some("replace"));
        assert_eq!(match_option("", &options), None);
        assert_eq!(match_option("x", &options), None);
    }

    #[test]
    fn test_scripted_prompter_errors_when_exhausted() {
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        assert!(prompter.ask("anything? ").is_err());
    }
}
