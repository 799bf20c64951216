//! # Utility Functions Module
//!
//! Small helpers shared by the probe and encode argument builders.

/// Builds a `Vec<String>` argument list from anything `Display`.
///
/// # Example
/// ```rust
/// use site_media_normalizer::args;
///
/// let crf = 23;
/// let args = args!["-crf", crf, "-preset", "medium"];
/// assert_eq!(args, vec!["-crf", "23", "-preset", "medium"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        ::std::vec![$(::std::string::ToString::to_string(&$item)),*]
    };
}

/// Format a float for an ffmpeg filter expression (`3`, `57.5`).
pub fn format_seconds(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        let text = format!("{:.3}", rounded);
        text.trim_end_matches('0').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_macro() {
        let bitrate = String::from("64k");
        let result = args!["-map", "0:a", "-b:a", bitrate, "-q:v", 10];
        assert_eq!(result, vec!["-map", "0:a", "-b:a", "64k", "-q:v", "10"]);
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(3.0), "3");
        assert_eq!(format_seconds(57.0), "57");
        assert_eq!(format_seconds(57.5), "57.5");
        assert_eq!(format_seconds(12.3456), "12.346");
    }
}
