//! Splits the inbound serial byte stream into command tokens.
//!
//! Rules, applied to each byte in order:
//! 1. null bytes are dropped
//! 2. `\n` or `\r` ends the current token (emitted if non-empty after trim)
//! 3. a byte from [`SINGLE_CHAR_COMMANDS`] that is the only byte in the
//!    accumulator is emitted immediately
//! 4. `X` or `Z` ends a multi-byte command, which includes the terminator
//! 5. an accumulator longer than [`MAX_TOKEN_LEN`] bytes is discarded
//!
//! Tokenizer state persists across chunks; a command may span any number
//! of serial reads.

use bytes::BytesMut;

/// Accumulator length above which a pending token is discarded.
pub const MAX_TOKEN_LEN: usize = 256;

/// Commands that are complete on their own as a single byte.
pub const SINGLE_CHAR_COMMANDS: &[u8] = b"0123456789!@#$%^&*-=[]bsv?";

/// Bytes that close a multi-byte command.
pub const TOKEN_TERMINATORS: [u8; 2] = [b'X', b'Z'];

/// Whether `byte` is a complete single-byte command.
#[inline]
pub fn is_single_char_command(byte: u8) -> bool {
    SINGLE_CHAR_COMMANDS.contains(&byte)
}

/// Incremental command tokenizer.
#[derive(Debug, Default)]
pub struct CommandTokenizer {
    pending: BytesMut,
}

impl CommandTokenizer {
    /// Create a tokenizer with an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes accumulated towards the next token.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Consume a chunk and return the tokens it completed, in order.
    pub fn ingest(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut tokens = Vec::new();

        for &byte in chunk {
            match byte {
                0 => continue,
                b'\n' | b'\r' => self.emit(&mut tokens),
                _ => {
                    self.pending.extend_from_slice(&[byte]);

                    if self.pending.len() == 1 && is_single_char_command(byte) {
                        self.emit(&mut tokens);
                    } else if TOKEN_TERMINATORS.contains(&byte) {
                        self.emit(&mut tokens);
                    } else if self.pending.len() > MAX_TOKEN_LEN {
                        tracing::warn!(
                            "Discarding {} bytes of unterminated command input",
                            self.pending.len()
                        );
                        self.pending.clear();
                    }
                }
            }
        }

        tokens
    }

    fn emit(&mut self, tokens: &mut Vec<String>) {
        let raw = self.pending.split();
        let token = String::from_utf8_lossy(&raw);
        let token = token.trim();
        if !token.is_empty() {
            tokens.push(token.to_string());
        }
    }
}
