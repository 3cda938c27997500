//! CRC-16 matching the contract `ModemCodec::gen_crc16` exposes to callers who need it
//! (mainly the software reference codec in `arq-modem`).

pub const CRC16_CCITT: crc::Algorithm<u16> = crc::Algorithm {
    width: 16,
    poly: 0x1021,
    init: 0xFFFF,
    refin: false,
    refout: false,
    xorout: 0x0000,
    check: 0x29B1,
    residue: 0x0000,
};

pub fn gen_crc16(input: &[u8]) -> u16 {
    let crc = crc::Crc::<u16>::new(&CRC16_CCITT);
    let mut digest = crc.digest();
    digest.update(input);
    digest.finalize()
}
