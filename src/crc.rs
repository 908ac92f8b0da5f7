//! CRC algorithms used on the SD/MMC bus.

/// CRC-7 over `data`, polynomial x^7 + x^3 + 1, MSB first.
///
/// Covers command frames and the first 15 bytes of the CID/CSD register
/// images. The result sits in the low 7 bits; on the wire it is sent as
/// `(crc << 1) | 1` with the trailing end bit.
pub fn crc7(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &byte in data {
        let mut d = byte;
        for _ in 0..8 {
            crc <<= 1;
            if (d & 0x80) ^ (crc & 0x80) != 0 {
                crc ^= 0x09;
            }
            d <<= 1;
        }
    }
    crc & 0x7F
}

/// CRC-16-CCITT over `data`, initial value 0, as used on each DAT line
/// during block transfers.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc = (crc >> 8) | (crc << 8);
        crc ^= byte as u16;
        crc ^= (crc & 0xFF) >> 4;
        crc ^= crc << 12;
        crc ^= (crc & 0xFF) << 5;
    }
    crc
}
