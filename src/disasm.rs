//! Renders a full memory image as an annotated assembly listing.
//!
//! Consecutive `out` instructions whose operand is a literal printable
//! byte (excluding newline) collapse into a single `out_literal_run(...)`
//! line; a literal newline becomes its own `out_newline` line. This is
//! purely a rendering convenience — the canonical instruction stream
//! decoded by [`crate::codec::decode`] remains one instruction per opcode.

use std::collections::HashMap;

use crate::codec::{decode, Instruction, Operand, Word, MEM_SIZE};

fn is_printable_non_newline(byte: u8) -> bool {
    byte != b'\n' && (byte.is_ascii_graphic() || byte == b' ')
}

/// One line of the listing, together with the address it starts at (used
/// to look up an annotation).
struct Line {
    addr: Word,
    body: String,
}

fn render_line(line: &Line, annotations: &HashMap<Word, String>) -> String {
    let mut out = format!("[{:05}]  {}", line.addr, line.body);
    if let Some(note) = annotations.get(&line.addr) {
        out.push_str("\t\t\t\t# ");
        out.push_str(note);
    }
    out
}

/// Produces the full disassembly listing for `image`, one line per
/// [`Line`], collapsing literal-byte `out` runs as described above.
pub fn render_disassembly(image: &[Word], annotations: &HashMap<Word, String>) -> String {
    let mut lines: Vec<Line> = Vec::new();
    let mut run: Vec<u8> = Vec::new();
    let mut run_start: Word = 0;

    let flush_run = |run: &mut Vec<u8>, run_start: Word, lines: &mut Vec<Line>| {
        if run.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(run).into_owned();
        lines.push(Line {
            addr: run_start,
            body: format!("out_literal_run({text:?})"),
        });
        run.clear();
    };

    let mut pos: usize = 0;
    while pos < MEM_SIZE {
        let addr = pos as Word;
        match decode(image, addr) {
            Ok((Instruction::Out(Operand::Literal(w)), len)) if w <= 255 => {
                let byte = w as u8;
                if byte == b'\n' {
                    flush_run(&mut run, run_start, &mut lines);
                    lines.push(Line {
                        addr,
                        body: "out_newline".to_string(),
                    });
                } else if is_printable_non_newline(byte) {
                    if run.is_empty() {
                        run_start = addr;
                    }
                    run.push(byte);
                } else {
                    flush_run(&mut run, run_start, &mut lines);
                    lines.push(Line {
                        addr,
                        body: format!("out {w}"),
                    });
                }
                pos += len as usize;
            }
            Ok((instr, len)) => {
                flush_run(&mut run, run_start, &mut lines);
                lines.push(Line {
                    addr,
                    body: instr.to_string(),
                });
                pos += len as usize;
            }
            Err(_) => {
                flush_run(&mut run, run_start, &mut lines);
                let word = image.get(pos).copied().unwrap_or(0);
                lines.push(Line {
                    addr,
                    body: format!("unknown({word})"),
                });
                pos += 1;
            }
        }
    }
    flush_run(&mut run, run_start, &mut lines);

    lines
        .iter()
        .map(|l| render_line(l, annotations))
        .collect::<Vec<_>>()
        .join("\n")
}
