//! LED colors shown on learn-mode badges.
//!
//! Lights are ordered `[BOTTOM_LEFT, BOTTOM_RIGHT, TOP_RIGHT, TOP_LEFT]`.

pub const RED: u32 = 0xff0000;
pub const ORANGE: u32 = 0xff7f00;
pub const YELLOW: u32 = 0xffff00;
pub const GREEN: u32 = 0x00ff00;
pub const CYAN: u32 = 0x00ffff;
pub const BLUE: u32 = 0x0000ff;
pub const PURPLE: u32 = 0x7f00ff;
pub const PINK: u32 = 0xff00ff;
pub const WHITE: u32 = 0xffffff;
pub const OFF: u32 = 0x000000;

pub const RAINBOW: [u32; 9] = [RED, ORANGE, YELLOW, GREEN, CYAN, BLUE, PURPLE, PINK, WHITE];

/// Brightness applied to group colors; full brightness is blinding up close
const GROUP_BRIGHTNESS: f32 = 0.1;

/// Scale each channel of a 0xRRGGBB color by `amount`
pub fn lighten(amount: f32, color: u32) -> u32 {
    let scale = |channel: u32| ((amount * channel as f32) as u32) & 0xff;
    scale((color >> 16) & 0xff) << 16 | scale((color >> 8) & 0xff) << 8 | scale(color & 0xff)
}

/// Lights for a learn badge: dimmed group color, or all off when ungrouped
pub fn group_lights(group: Option<usize>) -> [u32; 4] {
    match group {
        Some(index) => [lighten(GROUP_BRIGHTNESS, RAINBOW[index % RAINBOW.len()]); 4],
        None => [OFF; 4],
    }
}
