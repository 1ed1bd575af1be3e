use super::error::MetainfoError;
use crate::bencode::Value;

/// The parts of an info dictionary worth indexing.
///
/// Metadata fetched over `ut_metadata` is the bare info dictionary of a
/// torrent (no `announce` or other outer keys). Only the name and the file
/// listing are kept; piece hashes are irrelevant to a crawler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentInfo {
    /// Suggested name for the file or directory.
    pub name: String,
    /// Files in the torrent, paths relative to the torrent root.
    pub files: Vec<TorrentFile>,
    /// Total size of all files combined.
    pub total_length: u64,
}

/// A file listed in an info dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFile {
    /// `/`-separated path. For single-file torrents this is the torrent name.
    pub path: String,
    pub length: u64,
}

impl TorrentInfo {
    /// Projects a decoded info dictionary.
    ///
    /// # Errors
    ///
    /// Fails if `name` is missing or not UTF-8, if neither `length` nor
    /// `files` is present, or if a path component contains a `/` (which
    /// would let a torrent escape its own directory once joined).
    ///
    /// # Examples
    ///
    /// ```
    /// use dhtseek::bencode::decode;
    /// use dhtseek::metainfo::TorrentInfo;
    ///
    /// let value = decode(b"d6:lengthi42e4:name8:file.txte").unwrap();
    /// let info = TorrentInfo::from_value(&value).unwrap();
    /// assert_eq!(info.name, "file.txt");
    /// assert_eq!(info.total_length, 42);
    /// ```
    pub fn from_value(value: &Value) -> Result<Self, MetainfoError> {
        let dict = value.as_dict().ok_or(MetainfoError::InvalidField("info"))?;

        let name = dict
            .get(b"name".as_slice())
            .ok_or(MetainfoError::MissingField("name"))?
            .as_str()
            .ok_or(MetainfoError::InvalidField("name"))?
            .to_string();

        let files = if let Some(length) = dict.get(b"length".as_slice()) {
            vec![TorrentFile {
                path: name.clone(),
                length: parse_length(length)?,
            }]
        } else if let Some(files) = dict.get(b"files".as_slice()) {
            let files = files.as_list().ok_or(MetainfoError::InvalidField("files"))?;
            files.iter().map(parse_file).collect::<Result<Vec<_>, _>>()?
        } else {
            return Err(MetainfoError::MissingField("length or files"));
        };

        let total_length = files.iter().map(|f| f.length).sum();

        Ok(Self {
            name,
            files,
            total_length,
        })
    }
}

fn parse_length(value: &Value) -> Result<u64, MetainfoError> {
    value
        .as_integer()
        .and_then(|l| u64::try_from(l).ok())
        .ok_or(MetainfoError::InvalidField("length"))
}

fn parse_file(value: &Value) -> Result<TorrentFile, MetainfoError> {
    let length = value
        .get(b"length")
        .ok_or(MetainfoError::MissingField("file length"))?;
    let length = parse_length(length)?;

    let components = value
        .get(b"path")
        .and_then(|v| v.as_list())
        .ok_or(MetainfoError::MissingField("file path"))?;

    let mut parts = Vec::with_capacity(components.len());
    for component in components {
        let part = component
            .as_str()
            .ok_or(MetainfoError::InvalidField("path"))?;
        if part.contains('/') {
            return Err(MetainfoError::InvalidField("path"));
        }
        parts.push(part);
    }

    if parts.is_empty() {
        return Err(MetainfoError::InvalidField("path"));
    }

    Ok(TorrentFile {
        path: parts.join("/"),
        length,
    })
}
