/*
 * SPDX-FileCopyrightText: © 2024 srec-boots-rs contributors
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

use crc::{Algorithm, Crc, Digest};

/// CRC-32/MPEG-2, the polynomial and init value of the STM32 CRC unit.
const IMAGE_CRC_ALGORITHM: Algorithm<u32> = Algorithm {
    width: 32,
    poly: 0x04C1_1DB7,
    init: 0xFFFF_FFFF,
    refin: false,
    refout: false,
    xorout: 0x0000_0000,
    check: 0x0376_E6E7,
    residue: 0x0000_0000,
};

static IMAGE_CRC: Crc<u32> = Crc::<u32>::new(&IMAGE_CRC_ALGORITHM);

pub type ImageDigest = Digest<'static, u32>;

pub fn image_digest() -> ImageDigest {
    IMAGE_CRC.digest()
}

pub fn image_crc(bytes: &[u8]) -> u32 {
    let mut digest = image_digest();
    digest.update(bytes);
    digest.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_value() {
        assert_eq!(image_crc(b"123456789"), IMAGE_CRC_ALGORITHM.check);
    }

    #[test]
    fn digest_is_incremental() {
        let mut digest = image_digest();
        digest.update(b"1234");
        digest.update(b"56789");
        assert_eq!(digest.finalize(), image_crc(b"123456789"));
    }
}
