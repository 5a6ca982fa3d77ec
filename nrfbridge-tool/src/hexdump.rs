const WIDTH: usize = 0x10;

fn printable(chr: u8) -> char {
    if (0x20..0x7f).contains(&chr) {
        chr as char
    } else {
        '.'
    }
}

/// One packet, formatted as offset / hex / ascii lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexDump<'a> {
    prefix: &'a str,
    data: &'a [u8],
}

impl<'a> HexDump<'a> {
    pub fn new(prefix: &'a str, data: &'a [u8]) -> Self {
        Self { prefix, data }
    }
}

impl<'a> std::fmt::Display for HexDump<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for (i, chunk) in self.data.chunks(WIDTH).enumerate() {
            write!(f, "{}{:04x} ", self.prefix, i * WIDTH)?;
            for col in 0..WIDTH {
                if col % 8 == 0 {
                    write!(f, " ")?;
                }
                match chunk.get(col) {
                    Some(b) => write!(f, " {:02x}", b)?,
                    None => write!(f, "   ")?,
                }
            }
            write!(f, "  |")?;
            for b in chunk {
                write!(f, "{}", printable(*b))?;
            }
            writeln!(f, "|")?;
        }
        Ok(())
    }
}

pub fn hexdump(data: &[u8]) {
    print!("{}", HexDump::new("", data));
}

pub fn ehexdump_prefix(prefix: &str, data: &[u8]) {
    eprint!("{}", HexDump::new(prefix, data));
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_line() {
        assert_eq!(
            HexDump::new("> ", b"\x02\x01A").to_string(),
            "> 0000   02 01 41                                          |..A|\n"
        );
    }

    #[test]
    fn two_lines() {
        let data: Vec<u8> = (0x30..0x41).collect();
        let dump = HexDump::new("", &data).to_string();
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "0000   30 31 32 33 34 35 36 37  38 39 3a 3b 3c 3d 3e 3f  |0123456789:;<=>?|"
        );
        assert!(lines[1].starts_with("0010   40 "));
        assert!(lines[1].ends_with("|@|"));
    }

    #[test]
    fn empty() {
        assert_eq!(HexDump::new("", b"").to_string(), "");
    }
}
