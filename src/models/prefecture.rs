//! Prefecture identifiers and the fixed prefecture directory.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// Number of prefectures taking part in the battle.
pub const PREFECTURE_COUNT: u8 = 47;

/// Prefecture names in JIS code order (index 0 = prefecture 1).
const PREFECTURE_NAMES: [&str; PREFECTURE_COUNT as usize] = [
    "北海道",
    "青森県",
    "岩手県",
    "宮城県",
    "秋田県",
    "山形県",
    "福島県",
    "茨城県",
    "栃木県",
    "群馬県",
    "埼玉県",
    "千葉県",
    "東京都",
    "神奈川県",
    "新潟県",
    "富山県",
    "石川県",
    "福井県",
    "山梨県",
    "長野県",
    "岐阜県",
    "静岡県",
    "愛知県",
    "三重県",
    "滋賀県",
    "京都府",
    "大阪府",
    "兵庫県",
    "奈良県",
    "和歌山県",
    "鳥取県",
    "島根県",
    "岡山県",
    "広島県",
    "山口県",
    "徳島県",
    "香川県",
    "愛媛県",
    "高知県",
    "福岡県",
    "佐賀県",
    "長崎県",
    "熊本県",
    "大分県",
    "宮崎県",
    "鹿児島県",
    "沖縄県",
];

/// A validated prefecture id in `1..=47`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PrefectureId(u8);

impl PrefectureId {
    /// Validate a raw id.
    pub fn new(raw: i64) -> Result<Self, ValidationError> {
        if (1..=PREFECTURE_COUNT as i64).contains(&raw) {
            Ok(Self(raw as u8))
        } else {
            Err(ValidationError::InvalidPrefectureId)
        }
    }

    /// Iterate over every prefecture in ascending order.
    pub fn all() -> impl Iterator<Item = PrefectureId> {
        (1..=PREFECTURE_COUNT).map(PrefectureId)
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// Zero-based slot for fixed-size per-prefecture tables.
    pub fn index(&self) -> usize {
        (self.0 - 1) as usize
    }

    /// Japanese display name.
    pub fn name(&self) -> &'static str {
        PREFECTURE_NAMES[self.index()]
    }
}

impl TryFrom<u8> for PrefectureId {
    type Error = ValidationError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw as i64)
    }
}

impl From<PrefectureId> for u8 {
    fn from(id: PrefectureId) -> Self {
        id.0
    }
}

impl fmt::Display for PrefectureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PrefectureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrefectureId({})", self.0)
    }
}
