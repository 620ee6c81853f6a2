//! The script codec (spec.md §4.5): header parsing, segment slicing,
//! and independent per-segment encryption of `code`/`locals`/`globals`.
//!
//! A [`Script`] owns its decoded segments but not its instruction list;
//! [`crate::disasm::Disassembler`] decodes `code` into instructions and
//! writes back through [`Script::set_code`] on rebuild.

use crate::cipher::Cipher;
use crate::consts::{
    SCRIPT_HEADER_SIZE, SCRIPT_HEADER_SIZE_COMPRESSED, SCRIPT_MAGIC_ENCRYPTED, SCRIPT_MAGIC_ENCRYPTED_COMPRESSED,
    SCRIPT_MAGIC_PLAIN,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScriptHeader {
    pub identifier: u32,
    pub code_size: i32,
    pub local_var_count: i32,
    pub global_var_count: i32,
    pub script_flags: i32,
    pub globals_signature: i32,
    /// Only present (and only meaningful) for the compressed variant.
    pub compressed_size: Option<i32>,
}

impl ScriptHeader {
    fn decode(data: &[u8]) -> Result<ScriptHeader> {
        if data.len() < SCRIPT_HEADER_SIZE {
            return Err(Error::MalformedScript(format!(
                "script header needs {SCRIPT_HEADER_SIZE} bytes, got {}",
                data.len()
            )));
        }
        let identifier = u32::from_le_bytes(data[0..4].try_into().unwrap());
        let compressed = identifier == SCRIPT_MAGIC_ENCRYPTED_COMPRESSED;
        if compressed && data.len() < SCRIPT_HEADER_SIZE_COMPRESSED {
            return Err(Error::MalformedScript(format!(
                "compressed script header needs {SCRIPT_HEADER_SIZE_COMPRESSED} bytes, got {}",
                data.len()
            )));
        }
        Ok(ScriptHeader {
            identifier,
            code_size: i32::from_le_bytes(data[4..8].try_into().unwrap()),
            local_var_count: i32::from_le_bytes(data[8..12].try_into().unwrap()),
            global_var_count: i32::from_le_bytes(data[12..16].try_into().unwrap()),
            script_flags: i32::from_le_bytes(data[16..20].try_into().unwrap()),
            globals_signature: i32::from_le_bytes(data[20..24].try_into().unwrap()),
            compressed_size: if compressed {
                Some(i32::from_le_bytes(data[24..28].try_into().unwrap()))
            } else {
                None
            },
        })
    }

    fn encode(&self) -> Vec<u8> {
        let size = if self.compressed_size.is_some() {
            SCRIPT_HEADER_SIZE_COMPRESSED
        } else {
            SCRIPT_HEADER_SIZE
        };
        let mut out = vec![0u8; size];
        out[0..4].copy_from_slice(&self.identifier.to_le_bytes());
        out[4..8].copy_from_slice(&self.code_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.local_var_count.to_le_bytes());
        out[12..16].copy_from_slice(&self.global_var_count.to_le_bytes());
        out[16..20].copy_from_slice(&self.script_flags.to_le_bytes());
        out[20..24].copy_from_slice(&self.globals_signature.to_le_bytes());
        if let Some(compressed_size) = self.compressed_size {
            out[24..28].copy_from_slice(&compressed_size.to_le_bytes());
        }
        out
    }
}

/// A parsed script entry: header, decoded segments, and whether this
/// variant is one this crate can disassemble.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Script {
    header: ScriptHeader,
    code: Vec<u8>,
    locals: Vec<u32>,
    globals: Vec<u32>,
    encrypted: bool,
    /// `true` for the compressed variant, whose payload this crate does
    /// not touch beyond keeping it opaque (spec.md's declared Non-goal).
    unsupported: bool,
    /// The raw bytes of an unsupported script, kept verbatim so
    /// `bytes()` can hand them back unchanged.
    opaque_payload: Vec<u8>,
}

impl Script {
    /// Parses a script entry's payload. Plaintext and encrypted variants
    /// are fully decoded; the encrypted-compressed variant is returned
    /// with `unsupported() == true` and its payload left untouched.
    #[tracing::instrument(skip(data, cipher))]
    pub fn load(data: &[u8], cipher: &Cipher) -> Result<Script> {
        if data.len() < 4 {
            return Err(Error::MalformedScript("buffer shorter than the identifier".into()));
        }
        let identifier = u32::from_le_bytes(data[0..4].try_into().unwrap());

        if identifier == SCRIPT_MAGIC_ENCRYPTED_COMPRESSED {
            tracing::debug!("compressed script variant is unsupported, leaving payload opaque");
            return Ok(Script {
                header: ScriptHeader::decode(data)?,
                code: Vec::new(),
                locals: Vec::new(),
                globals: Vec::new(),
                encrypted: true,
                unsupported: true,
                opaque_payload: data.to_vec(),
            });
        }

        let encrypted = match identifier {
            SCRIPT_MAGIC_PLAIN => false,
            SCRIPT_MAGIC_ENCRYPTED => true,
            other => {
                return Err(Error::MalformedScript(format!("unrecognized script identifier 0x{other:08X}")));
            }
        };

        let header = ScriptHeader::decode(data)?;
        if header.code_size < 0 || header.local_var_count < 0 || header.global_var_count < 0 {
            return Err(Error::MalformedScript("negative header field".into()));
        }

        let code_start = SCRIPT_HEADER_SIZE;
        let code_end = code_start
            .checked_add(header.code_size as usize)
            .ok_or_else(|| Error::MalformedScript("code size overflow".into()))?;
        let locals_end = code_end
            .checked_add(header.local_var_count as usize * 4)
            .ok_or_else(|| Error::MalformedScript("locals size overflow".into()))?;
        let globals_end = locals_end
            .checked_add(header.global_var_count as usize * 4)
            .ok_or_else(|| Error::MalformedScript("globals size overflow".into()))?;

        let mut code = data
            .get(code_start..code_end)
            .ok_or_else(|| Error::MalformedScript("code segment exceeds buffer".into()))?
            .to_vec();
        let mut locals_bytes = data
            .get(code_end..locals_end)
            .ok_or_else(|| Error::MalformedScript("locals segment exceeds buffer".into()))?
            .to_vec();
        let mut globals_bytes = data
            .get(locals_end..globals_end)
            .ok_or_else(|| Error::MalformedScript("globals segment exceeds buffer".into()))?
            .to_vec();

        if encrypted {
            cipher.decrypt_in_place(&mut code)?;
            cipher.decrypt_in_place(&mut locals_bytes)?;
            cipher.decrypt_in_place(&mut globals_bytes)?;
        }

        Ok(Script {
            header,
            code,
            locals: decode_u32_array(&locals_bytes),
            globals: decode_u32_array(&globals_bytes),
            encrypted,
            unsupported: false,
            opaque_payload: Vec::new(),
        })
    }

    pub fn header(&self) -> &ScriptHeader {
        &self.header
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn locals(&self) -> &[u32] {
        &self.locals
    }

    pub fn globals(&self) -> &[u32] {
        &self.globals
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// `true` for the compressed variant this crate cannot disassemble.
    pub fn unsupported(&self) -> bool {
        self.unsupported
    }

    /// Replaces the code segment, e.g. after a rebuild re-encodes the
    /// instruction list back into bytes. Also updates `header.code_size`.
    pub(crate) fn set_code(&mut self, code: Vec<u8>) {
        self.header.code_size = code.len() as i32;
        self.code = code;
    }

    /// Serializes header || code || locals || globals, re-encrypting
    /// each segment independently if this script was loaded encrypted.
    /// An unsupported script's original bytes are handed back verbatim.
    #[tracing::instrument(skip(self, cipher))]
    pub fn bytes(&self, cipher: &Cipher) -> Result<Vec<u8>> {
        if self.unsupported {
            return Ok(self.opaque_payload.clone());
        }

        let mut code = self.code.clone();
        let mut locals_bytes = encode_u32_array(&self.locals);
        let mut globals_bytes = encode_u32_array(&self.globals);
        if self.encrypted {
            cipher.encrypt_in_place(&mut code)?;
            cipher.encrypt_in_place(&mut locals_bytes)?;
            cipher.encrypt_in_place(&mut globals_bytes)?;
        }

        let mut header = self.header;
        header.code_size = self.code.len() as i32;
        let mut out = header.encode();
        out.extend_from_slice(&code);
        out.extend_from_slice(&locals_bytes);
        out.extend_from_slice(&globals_bytes);
        Ok(out)
    }
}

fn decode_u32_array(bytes: &[u8]) -> Vec<u32> {
    bytes.chunks_exact(4).map(|c| u32::from_le_bytes(c.try_into().unwrap())).collect()
}

fn encode_u32_array(values: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}
