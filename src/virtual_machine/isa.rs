//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical instruction list and invokes a callback macro for code
//! generation, so the opcode table, the typed [`Instruction`] enum, its
//! encoder and its decoder never drift apart.
//!
//! # Bytecode Format
//!
//! Instructions are concatenated without padding or framing:
//! - Opcode: 2 bytes, big-endian
//! - Symbol operand: 1-byte length (1..=255) followed by UTF-8 bytes
//! - Numeric operand: 1-byte width (0..=4) followed by that many big-endian
//!   bytes with leading zeros stripped
//! - Byte operand: 1 raw byte

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::operand::{OperandReader, write_byte, write_num, write_sym};
use std::fmt;

/// Operand shapes an instruction argument can take on the wire.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OperandKind {
    /// Length-prefixed symbol string.
    Sym,
    /// Variable-width unsigned number.
    Num,
    /// Single raw byte.
    Byte,
}

/// Invokes a callback macro with the complete instruction definition list.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            /// NOOP ; does nothing
            Noop = 0, "NOOP" => [],
            /// CATCH node, flag, mode ; move to node and replace code if flag test matches
            Catch = 1, "CATCH" => [sym: Sym, flag: Num, mode: Byte],
            /// CROAK flag, mode ; restart the session if flag test matches
            Croak = 2, "CROAK" => [flag: Num, mode: Byte],
            /// LOAD sym, size ; resolve content for sym and cache it under a size limit (0 = sink)
            Load = 3, "LOAD" => [sym: Sym, size: Num],
            /// RELOAD sym ; resolve content for sym again and update the cached value
            Reload = 4, "RELOAD" => [sym: Sym],
            /// MAP sym ; expose a cached value to the next render
            Map = 5, "MAP" => [sym: Sym],
            /// MOVE target ; navigate and append the target node's code
            Move = 6, "MOVE" => [sym: Sym],
            /// HALT ; end the turn and wait for input
            Halt = 7, "HALT" => [],
            /// INCMP selector, target ; navigate to target if input equals selector
            InCmp = 8, "INCMP" => [selector: Sym, target: Sym],
            /// MSINK ; paginate menu items instead of a value
            MSink = 9, "MSINK" => [],
            /// MOUT selector, title ; add a menu item
            MOut = 10, "MOUT" => [selector: Sym, title: Sym],
            /// MNEXT selector, title ; enable the "next page" menu item
            MNext = 11, "MNEXT" => [selector: Sym, title: Sym],
            /// MPREV selector, title ; enable the "previous page" menu item
            MPrev = 12, "MPREV" => [selector: Sym, title: Sym],
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:expr, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        /// Opcode identifiers as they appear on the wire.
        #[repr(u16)]
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u16> for Opcode {
            type Error = VMError;

            fn try_from(value: u16) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Opcode::$name), )*
                    _ => Err(VMError::InvalidInstruction {
                        opcode: value,
                        offset: 0,
                    }),
                }
            }
        }

        impl Opcode {
            /// Every opcode, in wire order.
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$name, )* ];

            /// Returns the assembly mnemonic for this opcode.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Returns the operand shapes this opcode expects, in order.
            pub const fn operands(&self) -> &'static [OperandKind] {
                match self {
                    $( Opcode::$name => &[ $( OperandKind::$kind ),* ], )*
                }
            }
        }

        /// A decoded instruction with its typed arguments.
        #[derive(Clone, Debug, Eq, PartialEq)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name { $( $field: define_instructions!(@ty $kind) ),* },
            )*
        }

        impl Instruction {
            /// Returns the opcode of this instruction.
            pub const fn opcode(&self) -> Opcode {
                match self {
                    $( Instruction::$name { .. } => Opcode::$name, )*
                }
            }

            /// Appends the wire encoding of this instruction to `out`.
            ///
            /// # Panics
            ///
            /// Panics if a symbol argument is empty or longer than 255 bytes.
            pub fn encode_into(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&(self.opcode() as u16).to_be_bytes());
                match self {
                    $(
                        #[allow(unused_variables)]
                        Instruction::$name { $( $field ),* } => {
                            $( define_instructions!(@emit out, $kind, $field); )*
                        }
                    )*
                }
            }

            /// Reads the arguments of `op` from `reader`.
            pub(crate) fn read_args(
                op: Opcode,
                reader: &mut OperandReader<'_>,
            ) -> Result<Self, VMError> {
                match op {
                    $(
                        Opcode::$name => Ok(Instruction::$name {
                            $( $field: define_instructions!(@read reader, $kind)?, )*
                        }),
                    )*
                }
            }
        }

        impl fmt::Display for Instruction {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.opcode().mnemonic())?;
                match self {
                    $(
                        #[allow(unused_variables)]
                        Instruction::$name { $( $field ),* } => {
                            $( define_instructions!(@show f, $kind, $field); )*
                        }
                    )*
                }
                Ok(())
            }
        }
    };

    // ---------- types ----------
    (@ty Sym)  => { String };
    (@ty Num)  => { u32 };
    (@ty Byte) => { u8 };

    // ---------- encoding ----------
    (@emit $out:ident, Sym, $v:ident) => { write_sym($out, $v) };
    (@emit $out:ident, Num, $v:ident) => { write_num($out, *$v) };
    (@emit $out:ident, Byte, $v:ident) => { write_byte($out, *$v) };

    // ---------- decoding ----------
    (@read $r:ident, Sym) => { $r.read_sym() };
    (@read $r:ident, Num) => { $r.read_num() };
    (@read $r:ident, Byte) => { $r.read_byte() };

    // ---------- display ----------
    (@show $f:ident, Sym, $v:ident) => {
        if $v.is_empty() || $v.chars().any(|c| c.is_whitespace() || c == '"') {
            write!($f, " {:?}", $v)?
        } else {
            write!($f, " {}", $v)?
        }
    };
    (@show $f:ident, Num, $v:ident) => { write!($f, " {}", $v)? };
    (@show $f:ident, Byte, $v:ident) => { write!($f, " {}", $v)? };
}

for_each_instruction!(define_instructions);
