//! `encode` command implementation.

use anyhow::Result;
use dispatcher::{encode_frame, read_varint};

use crate::cli::EncodeArgs;

/// Execute the `encode` command
pub fn run_encode(args: &EncodeArgs) -> Result<()> {
    let frame = encode_frame(&args.message);
    let (length, prefix) = read_varint(&frame)?;

    println!(
        "{} byte(s): {} prefix + {} body",
        frame.len(),
        prefix,
        length
    );
    println!("{}", format_frame(&frame, args.hex));
    Ok(())
}

/// Hex (`0a 44 ..`) or decimal list (`[10, 68, ..]`)
fn format_frame(frame: &[u8], hex: bool) -> String {
    if hex {
        frame
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        format!("{frame:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_frame() {
        let frame = encode_frame("Hi");
        assert_eq!(format_frame(&frame, true), "02 48 69");
        assert_eq!(format_frame(&frame, false), "[2, 72, 105]");
    }

    #[test]
    fn test_empty_message() {
        assert_eq!(format_frame(&encode_frame(""), true), "00");
    }
}
