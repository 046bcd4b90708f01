use std::sync::OnceLock;

use ratatui::style::Color;

pub const SECONDARY_LIGHT_RGB: &str = "#7B5BB6";
pub const SECONDARY_DARK_RGB: &str = "#F694FF";

pub const SUCCESS_LIGHT_RGB: &str = "#2E7D32";
pub const SUCCESS_DARK_RGB: &str = "#4CAF50";

pub const FAILURE_LIGHT_RGB: &str = "#C62828";
pub const FAILURE_DARK_RGB: &str = "#F44336";

pub const INFO_LIGHT_RGB: &str = "#1976D2";
pub const INFO_DARK_RGB: &str = "#2196F3";

#[derive(Clone, Copy)]
struct ThemePair {
    light: (u8, u8, u8),
    dark: (u8, u8, u8),
}

#[derive(Clone, Copy)]
struct UiRgbConstants {
    secondary: ThemePair,
    success: ThemePair,
    failure: ThemePair,
    info: ThemePair,
}

fn pair(light: &str, dark: &str) -> ThemePair {
    ThemePair {
        light: parse_hex_rgb(light).unwrap_or_else(|| panic!("{light} must be #RRGGBB")),
        dark: parse_hex_rgb(dark).unwrap_or_else(|| panic!("{dark} must be #RRGGBB")),
    }
}

fn ui_rgb_constants() -> &'static UiRgbConstants {
    static CONSTANTS: OnceLock<UiRgbConstants> = OnceLock::new();
    CONSTANTS.get_or_init(|| UiRgbConstants {
        secondary: pair(SECONDARY_LIGHT_RGB, SECONDARY_DARK_RGB),
        success: pair(SUCCESS_LIGHT_RGB, SUCCESS_DARK_RGB),
        failure: pair(FAILURE_LIGHT_RGB, FAILURE_DARK_RGB),
        info: pair(INFO_LIGHT_RGB, INFO_DARK_RGB),
    })
}

fn parse_hex_rgb(value: &str) -> Option<(u8, u8, u8)> {
    let value = value.strip_prefix('#').unwrap_or(value);
    if value.len() != 6 {
        return None;
    }

    let r = u8::from_str_radix(value.get(0..2)?, 16).ok()?;
    let g = u8::from_str_radix(value.get(2..4)?, 16).ok()?;
    let b = u8::from_str_radix(value.get(4..6)?, 16).ok()?;
    Some((r, g, b))
}

/// Reads the background hint terminals export as `COLORFGBG` (`"<fg>;<bg>"`, ANSI indices).
///
/// Returns `Some(true)` for a light background.
fn light_background_from_colorfgbg(value: &str) -> Option<bool> {
    let bg = value.rsplit(';').next()?.trim().parse::<u8>().ok()?;
    Some(matches!(bg, 7 | 9..=15))
}

fn terminal_has_light_background() -> Option<bool> {
    static LIGHT: OnceLock<Option<bool>> = OnceLock::new();
    *LIGHT.get_or_init(|| {
        std::env::var("COLORFGBG")
            .ok()
            .and_then(|value| light_background_from_colorfgbg(&value))
    })
}

fn choose_rgb_for_theme(pair: ThemePair, light_background: Option<bool>) -> (u8, u8, u8) {
    match light_background {
        Some(true) => pair.light,
        // Default to dark-mode palettes when theme detection isn't available.
        Some(false) | None => pair.dark,
    }
}

fn themed(select: impl FnOnce(&UiRgbConstants) -> ThemePair) -> Color {
    let (r, g, b) = choose_rgb_for_theme(
        select(ui_rgb_constants()),
        terminal_has_light_background(),
    );
    Color::Rgb(r, g, b)
}

pub fn secondary_color() -> Color {
    themed(|constants| constants.secondary)
}

pub fn success_color() -> Color {
    themed(|constants| constants.success)
}

pub fn failure_color() -> Color {
    themed(|constants| constants.failure)
}

pub fn info_color() -> Color {
    themed(|constants| constants.info)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAIR: ThemePair = ThemePair {
        light: (1, 2, 3),
        dark: (4, 5, 6),
    };

    #[test]
    fn choose_rgb_for_theme_uses_background_when_available() {
        assert_eq!(choose_rgb_for_theme(PAIR, Some(true)), (1, 2, 3));
        assert_eq!(choose_rgb_for_theme(PAIR, Some(false)), (4, 5, 6));
    }

    #[test]
    fn choose_rgb_for_theme_defaults_to_dark_palette() {
        assert_eq!(choose_rgb_for_theme(PAIR, None), (4, 5, 6));
    }

    #[test]
    fn colorfgbg_background_index_decides_theme() {
        assert_eq!(light_background_from_colorfgbg("15;0"), Some(false));
        assert_eq!(light_background_from_colorfgbg("0;15"), Some(true));
        assert_eq!(light_background_from_colorfgbg("0;default;7"), Some(true));
        assert_eq!(light_background_from_colorfgbg("garbage"), None);
    }

    #[test]
    fn parse_hex_rgb_parses_rrggbb() {
        assert_eq!(parse_hex_rgb("#000000"), Some((0, 0, 0)));
        assert_eq!(parse_hex_rgb("#4CAF50"), Some((0x4C, 0xAF, 0x50)));
        assert_eq!(parse_hex_rgb("F44336"), Some((0xF4, 0x43, 0x36)));
        assert_eq!(parse_hex_rgb("#nope"), None);
        assert_eq!(parse_hex_rgb("#12345"), None);
    }
}
