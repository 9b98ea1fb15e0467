use std::borrow::Cow;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serializer;

const B64_PREFIX: &str = "b64:";

/// Serialises a `Path` as a plain string when it is UTF-8, otherwise as a
/// `b64:`-prefixed payload.  
/// 若路徑為 UTF-8 字串則直接輸出；否則以 base64 保存。
pub fn serialize<S>(path: &Path, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let encoded = encode(path);
    serializer.serialize_str(&encoded)
}

/// Serde helpers for path lists such as the session record.  
/// 路徑清單（例如工作階段紀錄）的序列化輔助。
pub mod vec {
    use super::*;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[PathBuf], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(value.len()))?;
        for path in value {
            seq.serialize_element(&encode(path))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<PathBuf>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let items = Vec::<String>::deserialize(deserializer)?;
        items
            .iter()
            .map(|text| decode(text).map_err(serde::de::Error::custom))
            .collect()
    }
}

fn encode(path: &Path) -> String {
    match path.to_str() {
        Some(text) => text.to_string(),
        None => {
            let bytes = path_to_bytes(path);
            let b64 = BASE64.encode(bytes);
            format!("{B64_PREFIX}{b64}")
        }
    }
}

fn decode(text: &str) -> Result<PathBuf, String> {
    if let Some(rest) = text.strip_prefix(B64_PREFIX) {
        let bytes = BASE64
            .decode(rest.as_bytes())
            .map_err(|err| format!("invalid base64 path payload: {err}"))?;
        bytes_to_path(bytes).map_err(|err| format!("invalid path payload: {err}"))
    } else {
        Ok(PathBuf::from(text))
    }
}

fn path_to_bytes(path: &Path) -> Cow<'_, [u8]> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Cow::Borrowed(path.as_os_str().as_bytes())
    }

    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt;
        let wide: Vec<u16> = path.as_os_str().encode_wide().collect();
        let mut bytes = Vec::with_capacity(wide.len() * 2);
        for unit in wide {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        Cow::Owned(bytes)
    }
}

fn bytes_to_path(bytes: Vec<u8>) -> Result<PathBuf, String> {
    #[cfg(unix)]
    {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;
        Ok(PathBuf::from(OsString::from_vec(bytes)))
    }

    #[cfg(windows)]
    {
        use std::ffi::OsString;
        use std::os::windows::ffi::OsStringExt;
        if bytes.len() % 2 != 0 {
            return Err("encoded Windows path has odd byte length".to_string());
        }
        let wide: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(PathBuf::from(OsString::from_wide(&wide)))
    }
}
