//! Per-video frequency chart geometry.
//!
//! Pure and deterministic: identical inputs give identical bars, so the
//! output can be compared with `==`.

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use crate::model::types::Video;

/// Bar colours, picked by upload year.
pub const PALETTE: [&str; 4] = ["Crimson", "GreenYellow", "Gold", "MediumSlateBlue"];

/// Height of the mirrored reflection relative to the bar.
pub const REFLECTION_RATIO: f64 = 0.5;

pub const MIN_BRIGHTNESS: f64 = 40.0;
pub const MAX_BRIGHTNESS: f64 = 90.0;

/// Geometry of one chart column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSpec {
    pub archive_index: usize,
    pub count: u64,
    /// Equal share of the chart width, in percent.
    pub width_share_percent: f64,
    /// `count / max_count`, in `[0, 1]`.
    pub height_ratio: f64,
    /// `None` for videos without matches, which render as a baseline only.
    pub brightness_percent: Option<f64>,
    pub reflection_height_ratio: f64,
    pub color_key: &'static str,
    /// Count, upload date, id and title, in that order.
    pub label: String,
}

impl BarSpec {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Build one bar per video.
///
/// # Panics
///
/// Panics when `per_video_count` and `videos` differ in length; payloads are
/// checked against their archive before they get here.
pub fn build(per_video_count: &[u64], videos: &[Video]) -> Vec<BarSpec> {
    assert_eq!(
        per_video_count.len(),
        videos.len(),
        "one count per video expected"
    );
    if videos.is_empty() {
        return Vec::new();
    }

    let width = 100.0 / videos.len() as f64;
    let max_count = per_video_count.iter().copied().max().unwrap_or(0);

    per_video_count
        .iter()
        .zip(videos)
        .enumerate()
        .map(|(archive_index, (&count, video))| {
            let height_ratio = if count == 0 || max_count == 0 {
                0.0
            } else {
                count as f64 / max_count as f64
            };
            let brightness_percent = (count > 0)
                .then(|| MIN_BRIGHTNESS + (MAX_BRIGHTNESS - MIN_BRIGHTNESS) * height_ratio);

            BarSpec {
                archive_index,
                count,
                width_share_percent: width,
                height_ratio,
                brightness_percent,
                reflection_height_ratio: height_ratio * REFLECTION_RATIO,
                color_key: color_key(video.uploaded_at),
                label: bar_label(count, video),
            }
        })
        .collect()
}

/// The chart is only worth drawing for a non-empty result over an archive
/// with more than one video.
pub fn is_visible(match_count: usize, video_count: usize) -> bool {
    match_count > 0 && video_count > 1
}

pub fn color_key(uploaded_at: i64) -> &'static str {
    let year = upload_year(uploaded_at);
    PALETTE[year.rem_euclid(PALETTE.len() as i32) as usize]
}

fn bar_label(count: u64, video: &Video) -> String {
    format!(
        "{} • {} • {}\n{}",
        count,
        format_upload_date(video.uploaded_at),
        video.id,
        video.title
    )
}

fn to_datetime(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

/// Calendar year of an upload timestamp (UTC).
pub fn upload_year(seconds: i64) -> i32 {
    to_datetime(seconds).year()
}

/// Human-readable upload date, e.g. `5 March 2021` (UTC).
pub fn format_upload_date(seconds: i64) -> String {
    to_datetime(seconds).format("%-d %B %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // 2020-01-01T00:00:00Z and 2021-03-05T12:00:00Z
    const JAN_2020: i64 = 1_577_836_800;
    const MAR_2021: i64 = 1_614_945_600;

    fn video(id: &str, uploaded_at: i64) -> Video {
        Video {
            id: id.into(),
            title: format!("Title {id}"),
            uploaded_at,
        }
    }

    #[test]
    fn max_bar_is_full_height_and_brightest() {
        let videos = vec![video("a", JAN_2020), video("b", MAR_2021), video("c", JAN_2020)];
        let bars = build(&[2, 4, 0], &videos);

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[1].height_ratio, 1.0);
        assert_eq!(bars[1].brightness_percent, Some(90.0));
        assert_eq!(bars[0].height_ratio, 0.5);
        assert_eq!(bars[0].brightness_percent, Some(65.0));
        assert_eq!(bars[0].reflection_height_ratio, 0.25);
        assert_eq!(bars[2].height_ratio, 0.0);
        assert_eq!(bars[2].brightness_percent, None);
        assert!(bars[2].is_empty());
    }

    #[test]
    fn colour_follows_upload_year() {
        // 2020 % 4 == 0, 2021 % 4 == 1
        assert_eq!(color_key(JAN_2020), "Crimson");
        assert_eq!(color_key(MAR_2021), "GreenYellow");
    }

    #[test]
    fn label_orders_count_date_id_title() {
        let bars = build(&[3], &[video("xyz", MAR_2021)]);
        assert_eq!(bars[0].label, "3 • 5 March 2021 • xyz\nTitle xyz");
    }

    #[test]
    fn all_zero_counts_give_flat_chart() {
        let bars = build(&[0, 0], &[video("a", 0), video("b", 0)]);
        assert!(bars.iter().all(|b| b.height_ratio == 0.0));
        assert!(bars.iter().all(|b| b.brightness_percent.is_none()));
    }

    #[test]
    fn identical_inputs_give_identical_bars() {
        let videos = vec![video("a", JAN_2020), video("b", MAR_2021)];
        assert_eq!(build(&[1, 7], &videos), build(&[1, 7], &videos));
    }

    #[test]
    fn visibility_needs_matches_and_several_videos() {
        assert!(is_visible(3, 2));
        assert!(!is_visible(3, 1));
        assert!(!is_visible(0, 5));
    }

    #[test]
    #[should_panic(expected = "one count per video")]
    fn length_mismatch_panics() {
        let _ = build(&[1, 2], &[video("a", 0)]);
    }

    proptest! {
        #[test]
        fn widths_are_equal_and_sum_to_hundred(counts in proptest::collection::vec(0u64..1000, 1..40)) {
            let videos: Vec<Video> = (0..counts.len())
                .map(|i| video(&i.to_string(), JAN_2020 + i as i64 * 31_536_000))
                .collect();
            let bars = build(&counts, &videos);
            prop_assert_eq!(bars.len(), counts.len());

            let total: f64 = bars.iter().map(|b| b.width_share_percent).sum();
            prop_assert!((total - 100.0).abs() < 1e-9);
            prop_assert!(bars.iter().all(|b| b.width_share_percent == bars[0].width_share_percent));

            let max = *counts.iter().max().unwrap();
            if max > 0 {
                let top = bars.iter().find(|b| b.count == max).unwrap();
                prop_assert_eq!(top.height_ratio, 1.0);
                prop_assert_eq!(top.brightness_percent, Some(90.0));
            }
            for bar in &bars {
                if let Some(b) = bar.brightness_percent {
                    prop_assert!((MIN_BRIGHTNESS..=MAX_BRIGHTNESS).contains(&b));
                }
            }
        }
    }
}
