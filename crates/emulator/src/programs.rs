use anyhow::{bail, Context, Result};
use kernel_core::{asm, Instruction, Program};

/// A program given on the command line, with when and how to submit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSpec {
    pub program: Program,
    pub priority: u8,
    /// Tick at which it is submitted; 0 submits before the clock starts.
    pub arrival: usize,
}

impl ProgramSpec {
    pub fn path(&self) -> &str {
        self.program.name()
    }
}

/// Parses `NAME:INSTRS[:PRIORITY[:ARRIVAL]]`, where `INSTRS` is a comma
/// separated list of `cpuN`, `io` and `exit`.
pub fn parse(text: &str) -> Result<ProgramSpec> {
    let mut fields = text.split(':');
    let name = fields.next().unwrap_or_default().trim();
    if name.is_empty() {
        bail!("program `{}` has no name", text);
    }
    let Some(body) = fields.next() else {
        bail!("program `{}` has no instructions", text);
    };
    let instructions = parse_instructions(body).with_context(|| format!("in program {}", name))?;
    let priority = match fields.next() {
        Some(field) => field
            .trim()
            .parse()
            .with_context(|| format!("bad priority `{}` for {}", field, name))?,
        None => 3,
    };
    let arrival = match fields.next() {
        Some(field) => field
            .trim()
            .parse()
            .with_context(|| format!("bad arrival tick `{}` for {}", field, name))?,
        None => 0,
    };
    if fields.next().is_some() {
        bail!("program `{}` has too many fields", text);
    }
    Ok(ProgramSpec {
        program: Program::new(name, instructions),
        priority,
        arrival,
    })
}

fn parse_instructions(body: &str) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    for token in body.split(',').map(str::trim).filter(|token| !token.is_empty()) {
        let token = token.to_ascii_lowercase();
        match token.as_str() {
            "io" => instructions.extend(asm::io()),
            "exit" => instructions.extend(asm::exit()),
            "cpu" => instructions.extend(asm::cpu(1)),
            _ => {
                let Some(count) = token.strip_prefix("cpu") else {
                    bail!("unknown instruction `{}`", token);
                };
                let count: usize = count
                    .parse()
                    .with_context(|| format!("bad cpu count in `{}`", token))?;
                instructions.extend(asm::cpu(count));
            }
        }
    }
    Ok(instructions)
}

/// The three classic programs, submitted together at priorities 3, 1 and 2.
pub fn defaults() -> Vec<ProgramSpec> {
    let spec = |name: &str, blocks: &[Vec<Instruction>], priority| ProgramSpec {
        program: Program::from_blocks(name, blocks),
        priority,
        arrival: 0,
    };
    vec![
        spec(
            "prg1.exe",
            &[asm::cpu(1), asm::io(), asm::cpu(1), asm::io(), asm::cpu(2)],
            3,
        ),
        spec("prg2.exe", &[asm::cpu(4), asm::io(), asm::cpu(1)], 1),
        spec("prg3.exe", &[asm::cpu(3)], 2),
    ]
}
