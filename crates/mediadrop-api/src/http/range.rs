//! Single byte-range parsing for `/stream`.

/// How a `Range` header applies to an artifact of a known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RangeRequest {
    /// No usable range; serve the whole file.
    Full,
    /// Inclusive byte window.
    Partial { start: u64, end: u64 },
    /// Syntactically valid but outside the file.
    Unsatisfiable,
}

impl RangeRequest {
    /// Interpret `header` against `size`.
    ///
    /// Malformed and multi-range headers fall back to [`RangeRequest::Full`].
    pub(crate) fn parse(header: Option<&str>, size: u64) -> Self {
        let Some(ranges) = header.and_then(|value| value.trim().strip_prefix("bytes=")) else {
            return Self::Full;
        };
        if ranges.contains(',') {
            return Self::Full;
        }
        let Some((start, end)) = ranges.split_once('-') else {
            return Self::Full;
        };
        let (start, end) = (start.trim(), end.trim());

        if start.is_empty() {
            let Ok(suffix) = end.parse::<u64>() else {
                return Self::Full;
            };
            if suffix == 0 || size == 0 {
                return Self::Unsatisfiable;
            }
            return Self::Partial {
                start: size.saturating_sub(suffix),
                end: size - 1,
            };
        }

        let Ok(start) = start.parse::<u64>() else {
            return Self::Full;
        };
        let end = if end.is_empty() {
            None
        } else {
            match end.parse::<u64>() {
                Ok(end) if end >= start => Some(end),
                _ => return Self::Full,
            }
        };
        if start >= size {
            return Self::Unsatisfiable;
        }
        let last = size - 1;
        Self::Partial {
            start,
            end: end.map_or(last, |end| end.min(last)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: u64 = 10_000_000;

    #[test]
    fn closed_range_is_honored() {
        assert_eq!(
            RangeRequest::parse(Some("bytes=0-999999"), SIZE),
            RangeRequest::Partial {
                start: 0,
                end: 999_999
            }
        );
    }

    #[test]
    fn open_and_suffix_ranges() {
        assert_eq!(
            RangeRequest::parse(Some("bytes=9999990-"), SIZE),
            RangeRequest::Partial {
                start: 9_999_990,
                end: SIZE - 1
            }
        );
        assert_eq!(
            RangeRequest::parse(Some("bytes=-500"), SIZE),
            RangeRequest::Partial {
                start: SIZE - 500,
                end: SIZE - 1
            }
        );
        assert_eq!(
            RangeRequest::parse(Some("bytes=-50"), 10),
            RangeRequest::Partial { start: 0, end: 9 }
        );
    }

    #[test]
    fn end_past_size_is_clamped() {
        assert_eq!(
            RangeRequest::parse(Some("bytes=5-100"), 10),
            RangeRequest::Partial { start: 5, end: 9 }
        );
    }

    #[test]
    fn start_past_size_is_unsatisfiable() {
        assert_eq!(
            RangeRequest::parse(Some("bytes=10-"), 10),
            RangeRequest::Unsatisfiable
        );
        assert_eq!(
            RangeRequest::parse(Some("bytes=-0"), 10),
            RangeRequest::Unsatisfiable
        );
        assert_eq!(
            RangeRequest::parse(Some("bytes=0-"), 0),
            RangeRequest::Unsatisfiable
        );
    }

    #[test]
    fn malformed_and_multi_ranges_are_ignored() {
        for header in [
            "bytes=0-1,5-6",
            "bytes=abc-",
            "bytes=5-1",
            "items=0-1",
            "bytes=",
            "bytes=-",
            "bytes=1",
        ] {
            assert_eq!(
                RangeRequest::parse(Some(header), SIZE),
                RangeRequest::Full,
                "{header}"
            );
        }
        assert_eq!(RangeRequest::parse(None, SIZE), RangeRequest::Full);
    }
}
