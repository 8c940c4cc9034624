use iced::widget::{container, text_input};
use iced::{Border, Color, Theme};
use std::sync::Arc;

// Main theme colors
pub const PRIMARY: Color = Color::from_rgb(0.78, 0.11, 0.29);
pub const BACKGROUND: Color = Color::from_rgb(0.08, 0.08, 0.1);
pub const TEXT: Color = Color::from_rgb(0.92, 0.92, 0.92);
pub const MUTED: Color = Color::from_rgb(0.6, 0.6, 0.65);
pub const ERROR: Color = Color::from_rgb(0.9, 0.2, 0.2);
pub const SUCCESS: Color = Color::from_rgb(0.0, 0.75, 0.35);
pub const WARNING: Color = Color::from_rgb(0.9, 0.6, 0.0);

pub fn custom_theme() -> Theme {
    let palette = iced::theme::Palette {
        background: BACKGROUND,
        text: TEXT,
        primary: PRIMARY,
        success: SUCCESS,
        danger: ERROR,
        warning: WARNING,
    };

    Theme::Custom(Arc::new(iced::theme::Custom::new(
        "rpi-formatter-dark".to_string(),
        palette,
    )))
}

pub fn main_box(theme: &Theme) -> container::Style {
    let palette = theme.extended_palette();

    container::Style {
        background: Some(palette.background.weak.color.into()),
        text_color: Some(TEXT),
        ..container::Style::default()
    }
}

// Output log panel
pub fn log_box(theme: &Theme) -> container::Style {
    let palette = theme.extended_palette();

    container::Style {
        background: Some(palette.background.weakest.color.into()),
        border: Border {
            width: 1.0,
            radius: 5.0.into(),
            color: palette.background.strong.color,
        },
        ..container::Style::default()
    }
}

pub fn error_banner(theme: &Theme) -> container::Style {
    let palette = theme.extended_palette();

    container::Style {
        background: Some(palette.danger.weak.color.into()),
        text_color: Some(TEXT),
        border: Border {
            width: 1.0,
            radius: 5.0.into(),
            color: ERROR,
        },
        ..container::Style::default()
    }
}

// Image path field turns red while the path does not point to a file
pub fn image_path_input(
    theme: &Theme,
    status: text_input::Status,
    image_exists: bool,
) -> text_input::Style {
    let mut style = text_input::default(theme, status);
    if !image_exists {
        style.border.color = ERROR;
        style.border.width = 1.5;
    }
    style
}
