use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Length of a compressed secp256k1 public key.
pub const NODE_ID_LEN: usize = 33;

/// A network node, identified by its compressed public key.
///
/// Ordering is byte-wise, which is also the ordering BOLT 7 uses to assign
/// channel directions.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId([u8; NODE_ID_LEN]);

impl NodeId {
    /// Build a node id from raw key bytes, checking the compressed-key prefix.
    pub fn from_bytes(bytes: [u8; NODE_ID_LEN]) -> Result<Self, CoreError> {
        match bytes[0] {
            0x02 | 0x03 => Ok(Self(bytes)),
            prefix => Err(CoreError::InvalidNodeId(format!(
                "bad key prefix 0x{prefix:02x}"
            ))),
        }
    }

    /// Parse a 66-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let raw = hex::decode(s).map_err(|e| CoreError::InvalidNodeId(format!("{s}: {e}")))?;
        let bytes: [u8; NODE_ID_LEN] = raw.try_into().map_err(|v: Vec<u8>| {
            CoreError::InvalidNodeId(format!("expected {NODE_ID_LEN} bytes, got {}", v.len()))
        })?;
        Self::from_bytes(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.to_hex())
    }
}

impl FromStr for NodeId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A channel identifier: funding block height, transaction index and output
/// index, packed as 24/24/16 bits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShortChannelId(u64);

impl ShortChannelId {
    pub fn new(block: u32, tx_index: u32, output: u16) -> Result<Self, CoreError> {
        if block >= 1 << 24 || tx_index >= 1 << 24 {
            return Err(CoreError::InvalidShortChannelId(format!(
                "{block}x{tx_index}x{output} out of range"
            )));
        }
        Ok(Self(
            (u64::from(block) << 40) | (u64::from(tx_index) << 16) | u64::from(output),
        ))
    }

    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn block(&self) -> u32 {
        (self.0 >> 40) as u32
    }

    pub fn tx_index(&self) -> u32 {
        ((self.0 >> 16) & 0xFF_FFFF) as u32
    }

    pub fn output(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

impl fmt::Display for ShortChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.block(), self.tx_index(), self.output())
    }
}

impl fmt::Debug for ShortChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortChannelId({self})")
    }
}

impl FromStr for ShortChannelId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidShortChannelId(s.to_string());
        let mut parts = s.split('x');
        let (Some(block), Some(tx), Some(out), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        let block = block.parse::<u32>().map_err(|_| invalid())?;
        let tx = tx.parse::<u32>().map_err(|_| invalid())?;
        let out = out.parse::<u16>().map_err(|_| invalid())?;
        Self::new(block, tx, out)
    }
}

impl Serialize for ShortChannelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ShortChannelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One traversable direction of a channel (`1x2x3/0`).
///
/// Direction 0 leaves the node with the smaller id, direction 1 the other.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShortChannelIdDir {
    pub scid: ShortChannelId,
    dir: u8,
}

impl ShortChannelIdDir {
    pub fn new(scid: ShortChannelId, dir: u8) -> Result<Self, CoreError> {
        if dir > 1 {
            return Err(CoreError::InvalidDirection(dir));
        }
        Ok(Self { scid, dir })
    }

    /// The direction used when forwarding from `source` to `destination`.
    pub fn between(scid: ShortChannelId, source: &NodeId, destination: &NodeId) -> Self {
        Self {
            scid,
            dir: if source < destination { 0 } else { 1 },
        }
    }

    pub fn dir(&self) -> u8 {
        self.dir
    }

    /// The opposite direction of the same channel.
    pub fn reverse(&self) -> Self {
        Self {
            scid: self.scid,
            dir: self.dir ^ 1,
        }
    }
}

impl fmt::Display for ShortChannelIdDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scid, self.dir)
    }
}

impl fmt::Debug for ShortChannelIdDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortChannelIdDir({self})")
    }
}

impl FromStr for ShortChannelIdDir {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scid, dir) = s
            .split_once('/')
            .ok_or_else(|| CoreError::InvalidShortChannelId(s.to_string()))?;
        let dir = match dir {
            "0" => 0,
            "1" => 1,
            _ => return Err(CoreError::InvalidShortChannelId(s.to_string())),
        };
        Self::new(scid.parse()?, dir)
    }
}

impl Serialize for ShortChannelIdDir {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ShortChannelIdDir {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An exact amount in millisatoshi.
///
/// All arithmetic is integer; overflow is reported, never wrapped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Msat(u64);

impl Msat {
    pub const ZERO: Msat = Msat(0);
    pub const MAX: Msat = Msat(u64::MAX);

    pub const fn from_msat(msat: u64) -> Self {
        Self(msat)
    }

    pub fn from_sat(sat: u64) -> Result<Self, CoreError> {
        sat.checked_mul(1000)
            .map(Self)
            .ok_or(CoreError::AmountOverflow("sat to msat"))
    }

    pub const fn msat(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Msat) -> Result<Msat, CoreError> {
        self.0
            .checked_add(other.0)
            .map(Msat)
            .ok_or(CoreError::AmountOverflow("add"))
    }

    pub fn checked_sub(self, other: Msat) -> Result<Msat, CoreError> {
        self.0
            .checked_sub(other.0)
            .map(Msat)
            .ok_or(CoreError::AmountOverflow("sub"))
    }

    pub fn saturating_add(self, other: Msat) -> Msat {
        Msat(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Msat) -> Msat {
        Msat(self.0.saturating_sub(other.0))
    }

    /// Sum a sequence of amounts, failing on overflow.
    pub fn checked_sum<I>(amounts: I) -> Result<Msat, CoreError>
    where
        I: IntoIterator<Item = Msat>,
    {
        amounts
            .into_iter()
            .try_fold(Msat::ZERO, |acc, a| acc.checked_add(a))
    }
}

impl fmt::Display for Msat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}msat", self.0)
    }
}

/// Fee charged for forwarding `amount`: `base + amount * ppm / 1_000_000`,
/// rounded down.
pub fn forwarding_fee(amount: Msat, base: Msat, ppm: u32) -> Result<Msat, CoreError> {
    let proportional = u128::from(amount.msat()) * u128::from(ppm) / 1_000_000;
    let proportional =
        u64::try_from(proportional).map_err(|_| CoreError::AmountOverflow("fee"))?;
    base.checked_add(Msat(proportional))
}
