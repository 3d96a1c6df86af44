//! Device classes shared by LSDP announces and mDNS service types.

/// Role a player advertises on the network.
///
/// Each class has a 16-bit LSDP code and a short tag that doubles as the
/// mDNS service name (`_<tag>._tcp.local.`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    /// Primary player (`musc`, LSDP class `0x0001`).
    Player,
    /// Secondary player in a multi-zone unit (`musp`, `0x0003`).
    SecondaryPlayer,
    /// Paired/slave speaker (`musz`, `0x0006`).
    PairedPlayer,
    /// Hub (`mush`, `0x0008`).
    Hub,
}

impl DeviceClass {
    /// Every class, in LSDP code order.
    pub const ALL: [DeviceClass; 4] = [
        DeviceClass::Player,
        DeviceClass::SecondaryPlayer,
        DeviceClass::PairedPlayer,
        DeviceClass::Hub,
    ];

    /// Look up a class by its LSDP code.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0001 => Some(DeviceClass::Player),
            0x0003 => Some(DeviceClass::SecondaryPlayer),
            0x0006 => Some(DeviceClass::PairedPlayer),
            0x0008 => Some(DeviceClass::Hub),
            _ => None,
        }
    }

    /// LSDP class code.
    pub fn code(self) -> u16 {
        match self {
            DeviceClass::Player => 0x0001,
            DeviceClass::SecondaryPlayer => 0x0003,
            DeviceClass::PairedPlayer => 0x0006,
            DeviceClass::Hub => 0x0008,
        }
    }

    /// Short device-type tag stored in [`crate::Device::device_type`].
    pub fn tag(self) -> &'static str {
        match self {
            DeviceClass::Player => "musc",
            DeviceClass::SecondaryPlayer => "musp",
            DeviceClass::PairedPlayer => "musz",
            DeviceClass::Hub => "mush",
        }
    }

    /// Fully qualified mDNS service type, e.g. `_musc._tcp.local.`.
    pub fn service_type(self) -> String {
        format!("_{}._tcp.local.", self.tag())
    }
}

/// Map an LSDP class code to its device-type tag, or `""` if unknown.
pub fn class_to_type(code: u16) -> &'static str {
    DeviceClass::from_code(code).map_or("", DeviceClass::tag)
}

/// Whether an LSDP class code belongs to a player we can control.
pub fn is_player_class(code: u16) -> bool {
    DeviceClass::from_code(code).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_to_type_known_and_unknown() {
        assert_eq!(class_to_type(0x0001), "musc");
        assert_eq!(class_to_type(0x0003), "musp");
        assert_eq!(class_to_type(0x0006), "musz");
        assert_eq!(class_to_type(0x0008), "mush");
        assert_eq!(class_to_type(0x0002), "");
        assert_eq!(class_to_type(0xFFFF), "");
    }

    #[test]
    fn player_class_set() {
        for code in 0..=0x0010u16 {
            let expected = matches!(code, 0x0001 | 0x0003 | 0x0006 | 0x0008);
            assert_eq!(is_player_class(code), expected, "code 0x{code:04x}");
        }
        assert!(!is_player_class(0xFFFF));
    }

    #[test]
    fn codes_round_trip_and_tags_are_distinct() {
        for class in DeviceClass::ALL {
            assert_eq!(DeviceClass::from_code(class.code()), Some(class));
        }
        let mut tags: Vec<&str> = DeviceClass::ALL.into_iter().map(DeviceClass::tag).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), DeviceClass::ALL.len());
    }

    #[test]
    fn service_type_format() {
        assert_eq!(DeviceClass::Hub.service_type(), "_mush._tcp.local.");
        assert_eq!(DeviceClass::Player.service_type(), "_musc._tcp.local.");
    }
}
