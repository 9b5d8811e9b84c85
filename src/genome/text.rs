//! Line-based program text format
//!
//! ```text
//! Fn-0000000000000000:
//!   Load-2[0000000000000000](0,1,0)
//!   Nand[0000000000000000](0,1,2)
//!   Submit(2)
//! ```
//!
//! The `[tag]` block is optional and defaults to all zeros; missing arguments
//! default to 0. Blank lines and `//` comments are skipped.

use super::instruction::{Instruction, Opcode, Tag, INST_ARG_CNT};
use super::program::{Function, Genome};
use std::path::Path;

const FUNCTION_PREFIX: &str = "Fn-";

#[derive(Debug, thiserror::Error)]
pub enum ProgramParseError {
    #[error("failed to read program file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("program contains no functions")]
    Empty,
}

fn syntax(line: usize, message: impl Into<String>) -> ProgramParseError {
    ProgramParseError::Syntax { line, message: message.into() }
}

impl Genome {
    /// Read and parse a program file
    pub fn load(path: impl AsRef<Path>) -> Result<Genome, ProgramParseError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ProgramParseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Genome::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Genome, ProgramParseError> {
        let mut genome = Genome::new();
        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = match raw.find("//") {
                Some(pos) => &raw[..pos],
                None => raw,
            }
            .trim();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix(FUNCTION_PREFIX) {
                let bits = rest
                    .strip_suffix(':')
                    .ok_or_else(|| syntax(line_no, "function header must end with ':'"))?;
                let tag = bits.trim().parse::<Tag>().map_err(|e| syntax(line_no, e))?;
                genome.push_function(Function::new(tag));
                continue;
            }

            let inst = parse_instruction(line).map_err(|e| syntax(line_no, e))?;
            let function = genome
                .functions
                .last_mut()
                .ok_or_else(|| syntax(line_no, "instruction before any function header"))?;
            function.push(inst);
        }

        if genome.functions.is_empty() {
            return Err(ProgramParseError::Empty);
        }
        Ok(genome)
    }

    /// Render in the same format `parse` reads
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for function in &self.functions {
            out.push_str(&format!("{}{}:\n", FUNCTION_PREFIX, function.tag));
            for inst in &function.instructions {
                out.push_str(&format!("  {}\n", inst));
            }
        }
        out
    }
}

fn parse_instruction(line: &str) -> Result<Instruction, String> {
    let open = line
        .find('(')
        .ok_or_else(|| format!("expected '(' in instruction '{}'", line))?;
    let close = line
        .rfind(')')
        .filter(|&c| c > open)
        .ok_or_else(|| format!("expected ')' in instruction '{}'", line))?;
    if !line[close + 1..].trim().is_empty() {
        return Err(format!("trailing characters after ')' in '{}'", line));
    }

    let head = line[..open].trim();
    let (name, tag) = match head.find('[') {
        Some(lb) => {
            let rb = head
                .rfind(']')
                .filter(|&rb| rb > lb)
                .ok_or_else(|| format!("unterminated tag in '{}'", line))?;
            (head[..lb].trim(), head[lb + 1..rb].parse::<Tag>()?)
        }
        None => (head, Tag::zero()),
    };
    let opcode = Opcode::from_name(name).ok_or_else(|| format!("unknown instruction '{}'", name))?;

    let mut args = [0i32; INST_ARG_CNT];
    let arg_text = line[open + 1..close].trim();
    if !arg_text.is_empty() {
        let values: Vec<&str> = arg_text.split(',').map(str::trim).collect();
        if values.len() > INST_ARG_CNT {
            return Err(format!("at most {} arguments allowed, got {}", INST_ARG_CNT, values.len()));
        }
        for (slot, value) in args.iter_mut().zip(values) {
            *slot = value
                .parse::<i32>()
                .map_err(|_| format!("invalid argument '{}'", value))?;
        }
    }

    Ok(Instruction { opcode, tag, args })
}
