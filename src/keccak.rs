/*!
# Keccak sponge

A from-scratch implementation of the Keccak-f permutation and the sponge
construction built on it. The state is a 5x5 grid of `w`-bit lanes where
`w = width / 25`; the permutation runs `12 + 2·log2(w)` rounds of
theta, rho, pi, chi and iota.

A `KeccakParams` value fixes the rate, the output length, the domain
separation suffix and the state width. The named sets below cover the
original Keccak submission (suffix `0x01`, used for ABI selectors), FIPS-202
SHA-3 (suffix `0x06`) and the SHAKE extendable-output functions (suffix
`0x1f`).
*/
use crate::{Error, Result};

const ROUND_CONSTANTS: [u64; 24] = [
    0x0000_0000_0000_0001,
    0x0000_0000_0000_8082,
    0x8000_0000_0000_808a,
    0x8000_0000_8000_8000,
    0x0000_0000_0000_808b,
    0x0000_0000_8000_0001,
    0x8000_0000_8000_8081,
    0x8000_0000_0000_8009,
    0x0000_0000_0000_008a,
    0x0000_0000_0000_0088,
    0x0000_0000_8000_8009,
    0x0000_0000_8000_000a,
    0x0000_0000_8000_808b,
    0x8000_0000_0000_008b,
    0x8000_0000_0000_8089,
    0x8000_0000_0000_8003,
    0x8000_0000_0000_8002,
    0x8000_0000_0000_0080,
    0x0000_0000_0000_800a,
    0x8000_0000_8000_000a,
    0x8000_0000_8000_8081,
    0x8000_0000_0000_8080,
    0x0000_0000_8000_0001,
    0x8000_0000_8000_8008,
];

// rotation offsets, indexed x + 5y
const RHO_OFFSETS: [u32; 25] = [
    0, 1, 62, 28, 27, //
    36, 44, 6, 55, 20, //
    3, 10, 43, 25, 39, //
    41, 45, 15, 21, 8, //
    18, 2, 61, 56, 14,
];

pub const DEFAULT_WIDTH: usize = 1600;

/// Rate, output length, padding suffix and state width (all lengths in bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeccakParams {
    pub rate: usize,
    pub output_length: usize,
    pub suffix: u8,
    pub width: usize,
}

impl KeccakParams {
    pub const fn new(rate: usize, output_length: usize, suffix: u8) -> Self {
        KeccakParams {
            rate,
            output_length,
            suffix,
            width: DEFAULT_WIDTH,
        }
    }

    pub const fn with_width(self, width: usize) -> Self {
        KeccakParams { width, ..self }
    }

    /// SHAKE128 squeezing `output_length` bits.
    pub const fn shake128(output_length: usize) -> Self {
        KeccakParams::new(1344, output_length, 0x1f)
    }

    /// SHAKE256 squeezing `output_length` bits.
    pub const fn shake256(output_length: usize) -> Self {
        KeccakParams::new(1088, output_length, 0x1f)
    }
}

pub const KECCAK_224: KeccakParams = KeccakParams::new(1152, 224, 0x01);
pub const KECCAK_256: KeccakParams = KeccakParams::new(1088, 256, 0x01);
pub const KECCAK_384: KeccakParams = KeccakParams::new(832, 384, 0x01);
pub const KECCAK_512: KeccakParams = KeccakParams::new(576, 512, 0x01);
pub const SHA3_224: KeccakParams = KeccakParams::new(1152, 224, 0x06);
pub const SHA3_256: KeccakParams = KeccakParams::new(1088, 256, 0x06);
pub const SHA3_384: KeccakParams = KeccakParams::new(832, 384, 0x06);
pub const SHA3_512: KeccakParams = KeccakParams::new(576, 512, 0x06);
pub const SHAKE128: KeccakParams = KeccakParams::shake128(256);
pub const SHAKE256: KeccakParams = KeccakParams::shake256(512);

/// Look up a parameter set by its conventional name, e.g. `keccak256` or `sha3-512`.
pub fn params_by_name(name: &str) -> Option<KeccakParams> {
    let params = match name.to_lowercase().replace('_', "-").as_str() {
        "keccak224" | "keccak-224" => KECCAK_224,
        "keccak256" | "keccak-256" => KECCAK_256,
        "keccak384" | "keccak-384" => KECCAK_384,
        "keccak512" | "keccak-512" => KECCAK_512,
        "sha3-224" => SHA3_224,
        "sha3-256" => SHA3_256,
        "sha3-384" => SHA3_384,
        "sha3-512" => SHA3_512,
        "shake128" => SHAKE128,
        "shake256" => SHAKE256,
        _ => return None,
    };
    Some(params)
}

/// The sponge for one validated parameter set.
#[derive(Debug, Clone)]
pub struct Sponge {
    params: KeccakParams,
    lane_bits: u32,
    lane_mask: u64,
    rounds: usize,
}

impl Sponge {
    pub fn new(params: KeccakParams) -> Result<Sponge> {
        let lane_bits = match params.width {
            200 | 400 | 800 | 1600 => (params.width / 25) as u32,
            width => {
                return Err(Error::MalformedParameter(format!(
                    "unsupported keccak state width {}",
                    width
                )))
            }
        };
        if params.rate == 0 || params.rate % 8 != 0 || params.rate >= params.width {
            return Err(Error::MalformedParameter(format!(
                "rate {} is invalid for state width {}",
                params.rate, params.width
            )));
        }
        if params.output_length == 0 || params.output_length % 8 != 0 {
            return Err(Error::MalformedParameter(format!(
                "output length {} is not a positive multiple of 8",
                params.output_length
            )));
        }
        Ok(Sponge::with_lane_bits(params, lane_bits))
    }

    fn with_lane_bits(params: KeccakParams, lane_bits: u32) -> Sponge {
        let lane_mask = if lane_bits == 64 {
            u64::MAX
        } else {
            (1u64 << lane_bits) - 1
        };
        Sponge {
            params,
            lane_bits,
            lane_mask,
            rounds: 12 + 2 * lane_bits.trailing_zeros() as usize,
        }
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn params(&self) -> &KeccakParams {
        &self.params
    }

    /// Absorb the whole message and squeeze `output_length` bits.
    pub fn digest(&self, message: &[u8]) -> Vec<u8> {
        let rate_bytes = self.params.rate / 8;
        let lane_bytes = (self.lane_bits / 8) as usize;
        let mut state = [0u64; 25];

        // pad10*1 with the domain suffix folded into the first padding byte
        let mut padded = message.to_vec();
        padded.push(self.params.suffix);
        while padded.len() % rate_bytes != 0 {
            padded.push(0);
        }
        let last = padded.len() - 1;
        padded[last] |= 0x80;

        for block in padded.chunks(rate_bytes) {
            for (i, byte) in block.iter().enumerate() {
                state[i / lane_bytes] ^= (*byte as u64) << (8 * (i % lane_bytes));
            }
            self.permute(&mut state);
        }

        let output_bytes = self.params.output_length / 8;
        let mut output = Vec::with_capacity(output_bytes + rate_bytes);
        loop {
            for i in 0..rate_bytes {
                output.push((state[i / lane_bytes] >> (8 * (i % lane_bytes))) as u8);
            }
            if output.len() >= output_bytes {
                break;
            }
            self.permute(&mut state);
        }
        output.truncate(output_bytes);
        output
    }

    fn rotate(&self, lane: u64, offset: u32) -> u64 {
        let offset = offset % self.lane_bits;
        if offset == 0 {
            lane
        } else {
            ((lane << offset) | (lane >> (self.lane_bits - offset))) & self.lane_mask
        }
    }

    fn permute(&self, state: &mut [u64; 25]) {
        for round in 0..self.rounds {
            // theta
            let mut parity = [0u64; 5];
            for x in 0..5 {
                parity[x] = state[x] ^ state[x + 5] ^ state[x + 10] ^ state[x + 15] ^ state[x + 20];
            }
            for x in 0..5 {
                let d = parity[(x + 4) % 5] ^ self.rotate(parity[(x + 1) % 5], 1);
                for y in 0..5 {
                    state[x + 5 * y] ^= d;
                }
            }

            // rho and pi
            let mut moved = [0u64; 25];
            for x in 0..5 {
                for y in 0..5 {
                    moved[y + 5 * ((2 * x + 3 * y) % 5)] =
                        self.rotate(state[x + 5 * y], RHO_OFFSETS[x + 5 * y]);
                }
            }

            // chi
            for y in 0..5 {
                for x in 0..5 {
                    state[x + 5 * y] = moved[x + 5 * y]
                        ^ (!moved[(x + 1) % 5 + 5 * y] & moved[(x + 2) % 5 + 5 * y]);
                }
            }

            // iota
            state[0] ^= ROUND_CONSTANTS[round] & self.lane_mask;
        }
    }
}

/// Hash `message` with the given parameter set and return the lowercase hex digest.
pub fn hash(message: &[u8], params: &KeccakParams) -> Result<String> {
    let sponge = Sponge::new(*params)?;
    Ok(hex::encode(sponge.digest(message)))
}

/// Keccak-256 as used for contract method selectors.
pub fn keccak256(message: &[u8]) -> [u8; 32] {
    let digest = Sponge::with_lane_bits(KECCAK_256, 64).digest(message);
    let mut output = [0u8; 32];
    output.copy_from_slice(&digest);
    output
}
