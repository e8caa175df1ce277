//! CLI utilities for Frost.
//!
//! The utilities present in this module back the `frost_cli` interactive client.
use std::io::{self, BufRead, Write};

/// Possible inputs from a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    /// Exit command `.exit`, or end of input
    Exit,
    /// Blank line
    Empty,
    /// Command arguments to send, e.g. `["SET", "foo", "bar"]`
    Args(Vec<String>),
}

/// Prompt user for one line of input.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> io::Result<Input>
where
    R: BufRead,
    W: Write,
{
    let mut s = String::default();
    write!(&mut writer, "> ")?;
    writer.flush()?;

    if reader.read_line(&mut s)? == 0 {
        return Ok(Input::Exit);
    }

    match s.trim() {
        ".exit" => Ok(Input::Exit),
        "" => Ok(Input::Empty),
        line => split_args(line)
            .map(Input::Args)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e)),
    }
}

/// Splits a line on whitespace; double quotes group words into one argument.
pub fn split_args(line: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_arg = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            c => {
                current.push(c);
                in_arg = true;
            }
        }
    }

    if quoted {
        return Err("unbalanced quotes".to_string());
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_prints_correctly() {
        let input = b".exit\n";
        let mut output = Vec::new();

        prompt(&input[..], &mut output).unwrap();

        let output = String::from_utf8(output).expect("not valid UTF-8");
        assert_eq!("> ", output);
    }

    #[test]
    fn prompt_handles_commands() {
        let input = b"set foo \"hello world\"\n";
        let mut output = Vec::new();

        let res = prompt(&input[..], &mut output).unwrap();
        assert_eq!(
            Input::Args(vec!["set".into(), "foo".into(), "hello world".into()]),
            res
        );
    }

    #[test]
    fn prompt_end_of_input_exits() {
        let mut output = Vec::new();

        assert_eq!(prompt(&b""[..], &mut output).unwrap(), Input::Exit);
        assert_eq!(prompt(&b"   \n"[..], &mut output).unwrap(), Input::Empty);
    }

    #[test]
    fn split_args_keeps_empty_quoted_argument() {
        assert_eq!(split_args("set k \"\"").unwrap(), vec!["set", "k", ""]);
    }

    #[test]
    #[should_panic(expected = "unbalanced quotes")]
    fn prompt_unbalanced_quotes() {
        let input = b"get \"foo\n";
        let mut output = Vec::new();

        prompt(&input[..], &mut output).unwrap();
    }
}
