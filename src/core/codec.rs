// src/core/codec.rs

//! Declarative field tables shared by both codecs.
//!
//! Each entity in `models.rs` is described once with `entity_codec!`, listing
//! its fields in schema order together with their description keys. The macro
//! expands to a [`Text`](crate::core::text::Text) implementation (keyed
//! object, unknown keys rejected, default-valued fields elided) and a
//! [`Binary`](crate::core::binary::Binary) implementation (fields concatenated
//! in the listed order). Fields marked `#[text_only]` exist in descriptions but
//! are never cached.
//!
//! Enums use `enum_codec!`: a lower-case name in text, a `u8` in the cache.

/// Generates `Text` and `Binary` for a struct deriving `Default` and `PartialEq`.
macro_rules! entity_codec {
    (@write [] $value:expr, $out:ident) => {
        $crate::core::binary::Binary::write($value, $out)?;
    };
    (@write [text_only] $value:expr, $out:ident) => {};
    (@read [] $target:expr, $input:ident) => {
        $target = $crate::core::binary::Binary::read($input)?;
    };
    (@read [text_only] $target:expr, $input:ident) => {};

    ($entity:ident { $( $(#[$flag:ident])? $field:ident => $key:literal ),* $(,)? }) => {
        impl $crate::core::text::Text for $entity {
            fn parse(
                tokens: &mut $crate::core::tokenizer::Tokenizer<'_>,
            ) -> Result<Self, $crate::core::tokenizer::ParseError> {
                let mut result = Self::default();
                $crate::core::text::parse_object(tokens, |tokens, key, key_token| {
                    match key.as_str() {
                        $( $key => result.$field = $crate::core::text::Text::parse(tokens)?, )*
                        _ => {
                            return Err($crate::core::tokenizer::ParseError::at(
                                key_token,
                                format!("unknown key '{}' in {}", key, stringify!($entity)),
                            ));
                        }
                    }
                    Ok(())
                })?;
                Ok(result)
            }

            fn write(&self, out: &mut String, indent: usize) {
                let defaults = Self::default();
                let mut entries: Vec<String> = Vec::new();
                $(
                    if self.$field != defaults.$field {
                        let mut entry = String::new();
                        $crate::core::text::Text::write(&$key.to_string(), &mut entry, indent + 1);
                        entry.push_str(": ");
                        $crate::core::text::Text::write(&self.$field, &mut entry, indent + 1);
                        entries.push(entry);
                    }
                )*
                $crate::core::text::write_block(out, indent, '{', '}', entries.len(), |i, buf| {
                    if let Some(entry) = entries.get(i) {
                        buf.push_str(entry);
                    }
                });
            }
        }

        impl $crate::core::binary::Binary for $entity {
            fn write<W: std::io::Write>(
                &self,
                out: &mut W,
            ) -> Result<(), $crate::core::binary::BinaryError> {
                $( $crate::core::codec::entity_codec!(@write [$($flag)?] &self.$field, out); )*
                Ok(())
            }

            fn read<R: std::io::Read>(
                input: &mut R,
            ) -> Result<Self, $crate::core::binary::BinaryError> {
                let mut result = Self::default();
                $( $crate::core::codec::entity_codec!(@read [$($flag)?] result.$field, input); )*
                Ok(result)
            }
        }
    };
}

/// Generates `Text`, `Binary` and `Display` for a fieldless enum.
macro_rules! enum_codec {
    ($name:ident { $( $variant:ident = $value:literal => $text:literal ),* $(,)? }) => {
        impl $crate::core::text::Text for $name {
            fn parse(
                tokens: &mut $crate::core::tokenizer::Tokenizer<'_>,
            ) -> Result<Self, $crate::core::tokenizer::ParseError> {
                let token = tokens.peek()?;
                let raw: String = $crate::core::text::Text::parse(tokens)?;
                match raw.to_ascii_lowercase().as_str() {
                    $( $text => Ok(Self::$variant), )*
                    _ => Err($crate::core::tokenizer::ParseError::at(
                        &token,
                        format!("unknown {} '{}'", stringify!($name), raw),
                    )),
                }
            }

            fn write(&self, out: &mut String, indent: usize) {
                $crate::core::text::Text::write(&self.to_string(), out, indent);
            }
        }

        impl $crate::core::binary::Binary for $name {
            fn write<W: std::io::Write>(
                &self,
                out: &mut W,
            ) -> Result<(), $crate::core::binary::BinaryError> {
                let value: u8 = match self {
                    $( Self::$variant => $value, )*
                };
                $crate::core::binary::Binary::write(&value, out)
            }

            fn read<R: std::io::Read>(
                input: &mut R,
            ) -> Result<Self, $crate::core::binary::BinaryError> {
                let value: u8 = $crate::core::binary::Binary::read(input)?;
                match value {
                    $( $value => Ok(Self::$variant), )*
                    _ => Err($crate::core::binary::BinaryError::InvalidEnum {
                        name: stringify!($name),
                        value,
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(match self {
                    $( Self::$variant => $text, )*
                })
            }
        }
    };
}

pub(crate) use entity_codec;
pub(crate) use enum_codec;
