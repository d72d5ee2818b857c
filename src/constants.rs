pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "12345678",
    "123456789",
    "qwertyuiop",
    "iloveyou",
    "admin123",
    "letmein1",
    "welcome1",
];

pub const SHOPPING_LIST_FILENAME: &str = "Shoppinglist.pdf";

// A4 layout for the exported shopping list, in millimeters.
pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const MARGIN_LEFT_MM: f32 = 20.0;
pub const MARGIN_BOTTOM_MM: f32 = 20.0;
pub const TITLE_Y_MM: f32 = 270.0;
pub const LINE_STEP_MM: f32 = 8.0;
