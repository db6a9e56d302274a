/// Compute X (result number) and Y (score) bounds for the dashboard chart
pub fn compute_chart_params(score_coords: &[(f64, f64)]) -> (f64, f64) {
    let mut highest_score = 0.0;
    for &(_, score) in score_coords {
        if score > highest_score {
            highest_score = score;
        }
    }

    let mut overall_count = match score_coords.last() {
        Some(x) => x.0,
        None => 1.0,
    };
    if overall_count < 1.0 {
        overall_count = 1.0;
    }

    (overall_count, highest_score.ceil().max(1.0))
}

/// Oldest result first, numbered from 1
pub fn score_coords(scores_newest_first: &[u32]) -> Vec<(f64, f64)> {
    scores_newest_first
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &score)| ((i + 1) as f64, f64::from(score)))
        .collect()
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
