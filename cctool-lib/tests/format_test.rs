use cctool_lib::format::{ImageFormat, load_image, parse_hex, save_image, to_hex};
use cctool_lib::{Error, MemoryImage};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tempfile::{Builder, NamedTempFile};

#[test]
fn test_hex_records_are_coalesced() {
    let hex = ":0400000001020304F2\n:0400040005060708DE\n:0410000011121314A2\n:00000001FF\n";
    let image = parse_hex(hex).unwrap();

    assert_eq!(image.segments().len(), 2);
    assert_eq!(image.segments()[0].address, 0x0000);
    assert_eq!(image.segments()[0].data, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(image.segments()[1].address, 0x1000);
    assert_eq!(image.segments()[1].data, vec![0x11, 0x12, 0x13, 0x14]);
}

#[test]
fn test_hex_extended_linear_address() {
    let hex = ":0400000001020304F2\n:020000040001F9\n:0400000011121314B2\n:00000001FF\n";
    let image = parse_hex(hex).unwrap();

    assert_eq!(image.segments().len(), 2);
    assert_eq!(image.segments()[1].address, 0x0001_0000);
    assert_eq!(image.segments()[1].data, vec![0x11, 0x12, 0x13, 0x14]);
}

#[test]
fn test_hex_checksum_error_is_reported() {
    let hex = ":0400000001020304F3\n:00000001FF\n";
    assert!(matches!(parse_hex(hex), Err(Error::IntelHex(_))));
}

#[test]
fn test_hex_output_reads_back() {
    let mut image = MemoryImage::new();
    image.push(0xFFF8, (0u8..24).collect::<Vec<_>>());
    image.push(0x0002_0000, vec![0xAB; 3]);

    let text = to_hex(&image).unwrap();
    assert!(text.ends_with(":00000001FF") || text.ends_with(":00000001FF\n"));

    let parsed = parse_hex(&text).unwrap();
    assert_eq!(parsed, image);
}

#[test]
fn test_detect_by_extension_and_content() {
    assert_eq!(ImageFormat::detect(Path::new("fw.HEX"), b"").unwrap(), ImageFormat::Hex);
    assert_eq!(ImageFormat::detect(Path::new("fw.bin"), b":").unwrap(), ImageFormat::Bin);
    assert_eq!(ImageFormat::detect(Path::new("fw.axf"), b"").unwrap(), ImageFormat::Elf);
    assert_eq!(ImageFormat::detect(Path::new("fw"), b":00000001FF").unwrap(), ImageFormat::Hex);
    assert_eq!(ImageFormat::detect(Path::new("fw"), b"\x7fELF\x01").unwrap(), ImageFormat::Elf);
    assert!(matches!(
        ImageFormat::detect(Path::new("fw.dat"), b"\x00\x01"),
        Err(Error::Format(_))
    ));
}

#[test]
fn test_format_names_parse() {
    assert_eq!(ImageFormat::from_str("IHEX").unwrap(), ImageFormat::Hex);
    assert_eq!(ImageFormat::from_str("binary").unwrap(), ImageFormat::Bin);
    assert_eq!(ImageFormat::Hex.to_string(), "hex");
}

#[test]
fn test_load_binary_at_base_address() {
    let mut file = Builder::new().suffix(".bin").tempfile().unwrap();
    file.write_all(&[1, 2, 3, 4]).unwrap();
    file.flush().unwrap();

    let image = load_image(file.path(), None, 0x0800).unwrap();
    assert_eq!(image, MemoryImage::single(0x0800, vec![1, 2, 3, 4]));
}

#[test]
fn test_load_unknown_format_fails() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&[0x00, 0x01]).unwrap();
    file.flush().unwrap();

    assert!(matches!(load_image(file.path(), None, 0), Err(Error::Format(_))));
}

#[test]
fn test_load_empty_file_fails() {
    let file = Builder::new().suffix(".bin").tempfile().unwrap();
    assert!(matches!(load_image(file.path(), None, 0), Err(Error::Format(_))));
}

#[test]
fn test_load_invalid_elf_fails() {
    let mut file = Builder::new().suffix(".elf").tempfile().unwrap();
    file.write_all(b"not an elf file").unwrap();
    file.flush().unwrap();

    assert!(load_image(file.path(), None, 0).is_err());
}

#[test]
fn test_save_hex_and_binary() {
    let mut image = MemoryImage::new();
    image.push(0x0000, vec![0x01, 0x02]);
    image.push(0x0004, vec![0x03]);

    let dir = tempfile::tempdir().unwrap();
    let hex_path = dir.path().join("out.hex");
    let bin_path = dir.path().join("out.bin");

    save_image(&hex_path, ImageFormat::Hex, &image).unwrap();
    save_image(&bin_path, ImageFormat::Bin, &image).unwrap();

    assert_eq!(load_image(&hex_path, None, 0).unwrap(), image);
    assert_eq!(std::fs::read(&bin_path).unwrap(), vec![0x01, 0x02, 0xFF, 0xFF, 0x03]);
    assert!(matches!(
        save_image(dir.path().join("out.elf"), ImageFormat::Elf, &image),
        Err(Error::Format(_))
    ));
}
