use cctool_lib::lock_bits::{decode, encode};
use cctool_lib::{Error, LockConfig};

#[test]
fn test_unlocked_configuration() {
    for page_size in [1024, 2048] {
        assert_eq!(encode(true, 0, true, page_size).unwrap(), 0x0E);
    }
}

#[test]
fn test_one_page_boot_and_debug_locked() {
    for page_size in [1024, 2048] {
        assert_eq!(encode(false, page_size, false, page_size).unwrap(), 0x1D);
    }
}

#[test]
fn test_misaligned_size_is_a_configuration_error() {
    for page_size in [1024, 2048] {
        for size in [page_size + 1, page_size / 2 + 1, 3 * page_size - 1] {
            assert!(
                matches!(encode(true, size, true, page_size), Err(Error::Config(_))),
                "size {size} page {page_size}"
            );
        }
    }
}

#[test]
fn test_oversized_lock_is_a_configuration_error() {
    for page_size in [1024, 2048] {
        for pages in [9, 16, 64] {
            assert!(matches!(
                encode(true, pages * page_size, true, page_size),
                Err(Error::Config(_))
            ));
        }
    }
}

#[test]
fn test_eight_pages_do_not_fit_the_field() {
    assert!(matches!(encode(true, 8 * 1024, true, 1024), Err(Error::Config(_))));
}

#[test]
fn test_zero_page_size_is_a_configuration_error() {
    assert!(matches!(encode(true, 0, true, 0), Err(Error::Config(_))));
}

#[test]
fn test_decode_inverts_encode() {
    let page_size = 1024;
    for pages in 0..=7 {
        for boot in [false, true] {
            for debug_enabled in [false, true] {
                let config = LockConfig {
                    boot,
                    protected_size: pages * page_size,
                    debug_enabled,
                };
                let byte = config.encode(page_size).unwrap();
                assert_eq!(byte & 0xE0, 0);
                assert_eq!(decode(byte, page_size), config);
            }
        }
    }
}
