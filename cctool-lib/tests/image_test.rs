use cctool_lib::image::{PAD_BYTE, combine};
use cctool_lib::{Error, MemoryImage, Segment};
use std::borrow::Cow;

#[test]
fn test_single_segment_is_returned_unchanged() {
    let image = MemoryImage::single(0x1234, vec![1, 2, 3]);
    let combined = image.combine().unwrap();

    assert_eq!(combined.origin, 0x1234);
    assert_eq!(&combined.data[..], &[1, 2, 3]);
    assert!(matches!(combined.data, Cow::Borrowed(_)));
}

#[test]
fn test_segments_are_placed_relative_to_lowest_address() {
    let segments = vec![
        Segment::new(0x1000, vec![0x05, 0x06]),
        Segment::new(0x0F00, vec![0x01, 0x02, 0x03]),
        Segment::new(0x1010, vec![0x09]),
    ];
    let combined = combine(&segments).unwrap();

    assert_eq!(combined.origin, 0x0F00);
    assert_eq!(combined.len(), 0x1011 - 0x0F00);
    for segment in &segments {
        let offset = (segment.address - combined.origin) as usize;
        assert_eq!(&combined.data[offset..offset + segment.data.len()], &segment.data[..]);
    }
    assert!(combined.data[3..0x100].iter().all(|&b| b == PAD_BYTE));
    assert!(combined.data[0x102..0x110].iter().all(|&b| b == PAD_BYTE));
}

#[test]
fn test_adjacent_segments_leave_no_padding() {
    let mut image = MemoryImage::new();
    image.push(0x10, vec![0xAA; 0x10]);
    image.push(0x20, vec![0xBB; 0x10]);

    let combined = image.combine().unwrap();
    assert_eq!(combined.origin, 0x10);
    assert_eq!(combined.len(), 0x20);
    assert!(!combined.data.contains(&PAD_BYTE));
}

#[test]
fn test_empty_image_is_rejected() {
    let image = MemoryImage::new();
    assert!(matches!(image.combine(), Err(Error::InvalidInput(_))));
}

#[test]
fn test_overlap_is_rejected() {
    let segments = vec![
        Segment::new(0x0100, vec![0; 0x20]),
        Segment::new(0x0000, vec![0; 0x10]),
        Segment::new(0x0110, vec![0; 0x04]),
    ];
    match combine(&segments) {
        Err(Error::OverlappingRegions { first, second }) => {
            assert_eq!(first, 0x0100);
            assert_eq!(second, 0x0110);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_data_len_excludes_gaps() {
    let mut image = MemoryImage::new();
    image.push(0x0000, vec![0; 4]);
    image.push(0x8000, vec![0; 6]);
    assert_eq!(image.data_len(), 10);
    assert_eq!(image.combine().unwrap().len(), 0x8006);
}
