// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{Decode, DecodeError};
use crate::file::MAGIC_BYTES;
use crate::format_version::FormatVersion;
use crate::silo::{Node, NodeId, Silo, StrId, MAX_NODE_TOKENS};
use byteorder::{LittleEndian, ReadBytesExt};
use rustc_hash::FxHashMap;
use std::io::Read;
use std::sync::Arc;
use varint_rs::VarintReader;

impl Decode for Silo {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        // Check header
        let mut magic = [0u8; MAGIC_BYTES.len()];
        reader.read_exact(&mut magic)?;

        if magic != MAGIC_BYTES {
            return Err(DecodeError::InvalidHeader("Silo"));
        }

        let version = reader.read_u8()?;

        if FormatVersion::try_from(version).is_err() {
            return Err(DecodeError::InvalidVersion(version));
        }

        let expected_checksum = reader.read_u64::<LittleEndian>()?;

        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;

        let actual_checksum = xxhash_rust::xxh3::xxh3_64(&payload);

        if actual_checksum != expected_checksum {
            return Err(DecodeError::ChecksumMismatch(
                actual_checksum,
                expected_checksum,
            ));
        }

        let mut payload = std::io::Cursor::new(payload);

        let string_count = payload.read_u32_varint()? as usize;
        let mut strings = Vec::<Arc<str>>::new();
        let mut lookup = FxHashMap::default();

        for _ in 0..string_count {
            let len = payload.read_u32_varint()? as usize;

            let mut buf = vec![0u8; len];
            payload.read_exact(&mut buf)?;

            let string: Arc<str> = std::str::from_utf8(&buf)?.into();

            // NOTE: String count was read as u32
            #[allow(clippy::cast_possible_truncation)]
            lookup.insert(string.clone(), strings.len() as StrId);

            strings.push(string);
        }

        let read_strid = |payload: &mut std::io::Cursor<Vec<u8>>| -> Result<StrId, DecodeError> {
            let id = payload.read_u32_varint()?;

            if id as usize >= string_count {
                return Err(DecodeError::InvalidReference("string id"));
            }

            Ok(id)
        };

        let read_opt_strid =
            |payload: &mut std::io::Cursor<Vec<u8>>| -> Result<Option<StrId>, DecodeError> {
                let raw = payload.read_u32_varint()?;

                if raw == 0 {
                    return Ok(None);
                }

                if (raw - 1) as usize >= string_count {
                    return Err(DecodeError::InvalidReference("string id"));
                }

                Ok(Some(raw - 1))
            };

        let node_count = payload.read_u32_varint()? as usize;
        let mut nodes = Vec::<Node>::new();

        for idx in 0..node_count {
            let name = read_strid(&mut payload)?;

            let parent = match payload.read_u32_varint()? {
                0 => None,
                raw => {
                    // Preorder: parents strictly precede their children
                    if (raw - 1) as usize >= idx {
                        return Err(DecodeError::InvalidReference("parent id"));
                    }

                    Some(raw - 1)
                }
            };

            if parent.is_none() && idx != 0 {
                return Err(DecodeError::InvalidReference("multiple roots"));
            }

            let text = read_opt_strid(&mut payload)?;
            let tail = read_opt_strid(&mut payload)?;

            let attr_count = payload.read_u32_varint()? as usize;
            let mut attrs = Vec::with_capacity(attr_count.min(64));

            for _ in 0..attr_count {
                let name = read_strid(&mut payload)?;
                let value = read_strid(&mut payload)?;
                attrs.push((name, value));
            }

            let token_count = payload.read_u8()? as usize;

            if token_count > MAX_NODE_TOKENS {
                return Err(DecodeError::InvalidReference("token list"));
            }

            let mut tokens = Vec::with_capacity(token_count);

            for _ in 0..token_count {
                tokens.push(read_strid(&mut payload)?);
            }

            // NOTE: Node count was read as u32
            #[allow(clippy::cast_possible_truncation)]
            let id = idx as NodeId;

            if let Some(parent) = parent {
                nodes[parent as usize].children.push(id);
            }

            nodes.push(Node {
                name,
                parent,
                text,
                tail,
                attrs: attrs.into_boxed_slice(),
                tokens: tokens.into_boxed_slice(),
                children: Vec::new(),
            });
        }

        Ok(Self {
            strings,
            lookup,
            nodes,
        })
    }
}
