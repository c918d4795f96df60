/// Record types the engine reasons about. Anything else travels as its raw
/// `u16` value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RecordType {
    A = 1,
    Ns = 2,
    Cname = 5,
    Soa = 6,
    Ptr = 12,
    Mx = 15,
    Txt = 16,
    Aaaa = 28,
    Opt = 41,
}

impl RecordType {
    pub fn to_int(self) -> u16 {
        self as u16
    }

    pub fn from_int(value: u16) -> Option<Self> {
        Some(match value {
            1 => Self::A,
            2 => Self::Ns,
            5 => Self::Cname,
            6 => Self::Soa,
            12 => Self::Ptr,
            15 => Self::Mx,
            16 => Self::Txt,
            28 => Self::Aaaa,
            41 => Self::Opt,
            _ => return None,
        })
    }
}

/// The internet class.
pub const CLASS_IN: u16 = 1;

#[cfg(test)]
mod tests {
    use super::RecordType;

    #[test]
    fn maps_known_values() {
        assert_eq!(RecordType::from_int(1), Some(RecordType::A));
        assert_eq!(RecordType::from_int(41), Some(RecordType::Opt));
        assert_eq!(RecordType::Aaaa.to_int(), 28);
        assert_eq!(RecordType::from_int(99), None);
    }
}
