//! Known event locations and their display names.

pub const LOC_UNKNOWN: &str = "unknown";

/// Location ids the resolver is trained on, with human-friendly names.
pub const LOCATIONS: &[(&str, &str)] = &[
    ("tea_room", "Tea Room"),
    ("techops", "BestOps"),
    ("panels1", "Panels 1"),
    ("panels2", "Panels 2"),
    ("panels3", "Panels 3"),
    ("space_clinic", "Space Clinic"),
    ("hotel_jail", "Hotel Jail"),
    ("lego_room", "Lego Room"),
    ("escape_room", "Escape Room"),
    ("lan", "LAN"),
    ("consoles", "Consoles"),
    ("concerts", "Concerts"),
    ("arcade", "Arcade"),
    ("stops", "Staff Operations"),
    ("vip_lounge", "VIP Lounge"),
    ("makerspace_upper", "Makerspace (Magnolia)"),
    ("makerspace_lower", "Makerspace (Foyer)"),
    ("tabletop", "Tabletop"),
    ("registration", "Registration"),
    ("video_room", "Video Room"),
    ("toool", "Toool"),
    (LOC_UNKNOWN, "Nobody Knooows"),
];

/// Display name for a location id, if it is in the catalog
pub fn display_name(location: &str) -> Option<&'static str> {
    LOCATIONS
        .iter()
        .find(|(id, _)| *id == location)
        .map(|(_, name)| *name)
}
