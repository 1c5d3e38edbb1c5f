// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{Encode, EncodeError};
use crate::file::MAGIC_BYTES;
use crate::format_version::CURRENT_VERSION;
use crate::silo::Silo;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use varint_rs::VarintWriter;

// Wire layout:
//
// [magic][version u8][payload checksum u64 LE]
// payload:
//   string count, then per string: length + UTF-8 bytes
//   node count, then per node in preorder:
//     name strid, parent+1, text strid+1, tail strid+1,
//     attr count + (name strid, value strid) pairs sorted by name,
//     token count u8 + token strids
//
// All counts and references are u32 varints. Child lists are implicit:
// preorder plus parent pointers reproduce document order on load.
impl Encode for Silo {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        let mut payload = Vec::new();

        // NOTE: String and node counts are bounded by u32 on the wire
        #[allow(clippy::cast_possible_truncation)]
        {
            payload.write_u32_varint(self.strings.len() as u32)?;

            for string in &self.strings {
                payload.write_u32_varint(string.len() as u32)?;
                payload.write_all(string.as_bytes())?;
            }

            payload.write_u32_varint(self.nodes.len() as u32)?;

            for node in &self.nodes {
                payload.write_u32_varint(node.name)?;
                payload.write_u32_varint(node.parent.map_or(0, |p| p + 1))?;
                payload.write_u32_varint(node.text.map_or(0, |t| t + 1))?;
                payload.write_u32_varint(node.tail.map_or(0, |t| t + 1))?;

                payload.write_u32_varint(node.attrs.len() as u32)?;

                for (name, value) in &node.attrs {
                    payload.write_u32_varint(*name)?;
                    payload.write_u32_varint(*value)?;
                }

                payload.write_u8(node.tokens.len() as u8)?;

                for token in &node.tokens {
                    payload.write_u32_varint(*token)?;
                }
            }
        }

        writer.write_all(&MAGIC_BYTES)?;
        writer.write_u8(CURRENT_VERSION.into())?;
        writer.write_u64::<LittleEndian>(xxhash_rust::xxh3::xxh3_64(&payload))?;
        writer.write_all(&payload)?;

        Ok(())
    }
}
