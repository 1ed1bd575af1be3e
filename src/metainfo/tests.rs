use super::*;
use crate::bencode::decode;

#[test]
fn test_info_hash_hex_roundtrip() {
    let hex = "7de9501d9e6b0afafec3206a63fa331f727447b3";
    let hash: InfoHash = hex.parse().unwrap();
    assert_eq!(hash.to_hex(), hex);
    assert_eq!(hash.to_string(), hex);
    assert_eq!(hash.as_bytes()[0], 0x7d);
}

#[test]
fn test_info_hash_invalid() {
    assert!(InfoHash::from_bytes(&[0u8; 19]).is_err());
    assert!("7de9".parse::<InfoHash>().is_err());
    assert!("zz".repeat(20).parse::<InfoHash>().is_err());
}

#[test]
fn test_info_hash_from_metadata() {
    // SHA-1 of the empty string
    let hash = InfoHash::from_metadata(b"");
    assert_eq!(hash.to_hex(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
}

#[test]
fn test_single_file_info() {
    let value = decode(b"d6:lengthi1024e4:name8:test.txt12:piece lengthi16384ee").unwrap();
    let info = TorrentInfo::from_value(&value).unwrap();

    assert_eq!(info.name, "test.txt");
    assert_eq!(
        info.files,
        vec![TorrentFile {
            path: "test.txt".into(),
            length: 1024
        }]
    );
    assert_eq!(info.total_length, 1024);
}

#[test]
fn test_multi_file_info() {
    let value = decode(
        b"d5:filesld6:lengthi10e4:pathl3:dir5:a.txteed6:lengthi20e4:pathl5:b.txteee4:name4:roote",
    )
    .unwrap();
    let info = TorrentInfo::from_value(&value).unwrap();

    assert_eq!(info.name, "root");
    assert_eq!(info.files.len(), 2);
    assert_eq!(info.files[0].path, "dir/a.txt");
    assert_eq!(info.files[1].path, "b.txt");
    assert_eq!(info.total_length, 30);
}

#[test]
fn test_path_with_slash_rejected() {
    let value =
        decode(b"d5:filesld6:lengthi10e4:pathl5:../a/5:b.txteee4:name4:roote").unwrap();
    assert!(matches!(
        TorrentInfo::from_value(&value),
        Err(MetainfoError::InvalidField("path"))
    ));
}

#[test]
fn test_missing_fields() {
    let no_name = decode(b"d6:lengthi1ee").unwrap();
    assert!(matches!(
        TorrentInfo::from_value(&no_name),
        Err(MetainfoError::MissingField("name"))
    ));

    let no_length = decode(b"d4:name1:xe").unwrap();
    assert!(matches!(
        TorrentInfo::from_value(&no_length),
        Err(MetainfoError::MissingField("length or files"))
    ));

    let negative = decode(b"d6:lengthi-1e4:name1:xe").unwrap();
    assert!(TorrentInfo::from_value(&negative).is_err());
}

#[test]
fn test_non_utf8_name_rejected() {
    let value = decode(b"d6:lengthi1e4:name2:\xff\xfee").unwrap();
    assert!(matches!(
        TorrentInfo::from_value(&value),
        Err(MetainfoError::InvalidField("name"))
    ));
}
