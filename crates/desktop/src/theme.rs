use iced::color;
use iced::theme::Palette;
use iced::{Color, Theme};

use crate::settings::Appearance;

/// Resolve the iced Theme from appearance + high_contrast settings.
pub fn resolve_theme(appearance: Appearance, high_contrast: bool) -> Theme {
    let is_dark = match appearance {
        Appearance::Dark => true,
        Appearance::Light => false,
        Appearance::System => detect_system_dark_mode(),
    };

    let palette = match (is_dark, high_contrast) {
        (true, false) => Palette {
            background: color!(0x17, 0x1a, 0x1d),
            text: color!(0xd0, 0xd4, 0xd8),
            primary: color!(0x3d, 0xb8, 0x6b),
            success: color!(0x30, 0xd1, 0x58),
            warning: color!(0xff, 0xcc, 0x00),
            danger: color!(0xff, 0x45, 0x3a),
        },
        (false, false) => Palette {
            background: color!(0xf4, 0xf6, 0xf5),
            text: color!(0x1d, 0x1f, 0x1e),
            primary: color!(0x1f, 0x9d, 0x55),
            success: color!(0x34, 0xc7, 0x59),
            warning: color!(0xff, 0x9f, 0x0a),
            danger: color!(0xff, 0x3b, 0x30),
        },
        (true, true) => Palette {
            background: color!(0x00, 0x00, 0x00),
            text: color!(0xff, 0xff, 0xff),
            primary: color!(0x4c, 0xe0, 0x84),
            success: color!(0x30, 0xd1, 0x58),
            warning: color!(0xff, 0xd6, 0x0a),
            danger: color!(0xff, 0x45, 0x3a),
        },
        (false, true) => Palette {
            background: color!(0xff, 0xff, 0xff),
            text: color!(0x00, 0x00, 0x00),
            primary: color!(0x00, 0x6b, 0x2e),
            success: color!(0x24, 0x8a, 0x3d),
            warning: color!(0xb2, 0x5c, 0x00),
            danger: color!(0xd7, 0x00, 0x15),
        },
    };

    Theme::custom("FaceCam", palette)
}

/// Secondary text color for hints and captions.
pub fn muted_color(theme: &Theme) -> Color {
    Color {
        a: 0.6,
        ..theme.palette().text
    }
}

pub fn status_color(theme: &Theme, healthy: bool) -> Color {
    let palette = theme.palette();
    if healthy {
        palette.success
    } else {
        palette.danger
    }
}

fn detect_system_dark_mode() -> bool {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("defaults")
            .args(["read", "-g", "AppleInterfaceStyle"])
            .output()
            .map(|o| {
                String::from_utf8_lossy(&o.stdout)
                    .trim()
                    .eq_ignore_ascii_case("dark")
            })
            .unwrap_or(true)
    }
    #[cfg(target_os = "windows")]
    {
        // AppsUseLightTheme is 0x0 in dark mode.
        std::process::Command::new("reg")
            .args([
                "query",
                r"HKCU\Software\Microsoft\Windows\CurrentVersion\Themes\Personalize",
                "/v",
                "AppsUseLightTheme",
            ])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains("0x0"))
            .unwrap_or(true)
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        true
    }
}
