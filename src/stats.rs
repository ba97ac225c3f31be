use crate::subjects::SubjectDefinition;
use serde::Serialize;

/// One-decimal rounding used for every displayed average.
/// Halves round away from zero: `2.25 -> 2.3`, `-2.25 -> -2.3`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    if !x.is_finite() {
        return 0.0;
    }
    (x * 10.0).round() / 10.0
}

/// Arithmetic mean; `0.0` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / (values.len() as f64)
}

/// Population standard deviation: `sqrt(mean((x - mean)^2))`, not the n-1 sample form.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (values.len() as f64);
    var.sqrt()
}

fn ratio(sum: f64, count: usize) -> f64 {
    if count > 0 {
        sum / (count as f64)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SubjectSum {
    sum: f64,
    count: usize,
}

/// Running totals for one group (an exam, a class, a student).
#[derive(Debug, Clone)]
pub struct AggregateBucket {
    count: usize,
    sum_net: f64,
    sum_score: f64,
    nets: Vec<f64>,
    subjects: Vec<SubjectSum>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub key: String,
    pub code: String,
    pub label: String,
    pub avg_net: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketStats {
    pub count: usize,
    pub avg_net: f64,
    pub avg_score: f64,
    pub std_dev_net: f64,
    pub subjects: Vec<SubjectAverage>,
}

impl AggregateBucket {
    pub fn new(subject_count: usize) -> Self {
        Self {
            count: 0,
            sum_net: 0.0,
            sum_score: 0.0,
            nets: Vec::new(),
            subjects: vec![SubjectSum::default(); subject_count],
        }
    }

    /// `subject_nets` is aligned with the subject list the bucket was created for.
    pub fn add(&mut self, net: f64, score: f64, subject_nets: &[Option<f64>]) {
        self.count += 1;
        self.sum_net += net;
        self.sum_score += score;
        self.nets.push(net);
        for (slot, value) in self.subjects.iter_mut().zip(subject_nets) {
            if let Some(v) = value {
                slot.sum += v;
                slot.count += 1;
            }
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean_net(&self) -> f64 {
        ratio(self.sum_net, self.count)
    }

    pub fn finish(&self, subjects: &[SubjectDefinition]) -> BucketStats {
        let subject_averages = subjects
            .iter()
            .zip(self.subjects.iter())
            .map(|(def, s)| SubjectAverage {
                key: def.key.clone(),
                code: def.code.clone(),
                label: def.label.clone(),
                avg_net: round_off_1_decimal(ratio(s.sum, s.count)),
                count: s.count,
            })
            .collect();
        BucketStats {
            count: self.count,
            avg_net: round_off_1_decimal(ratio(self.sum_net, self.count)),
            avg_score: round_off_1_decimal(ratio(self.sum_score, self.count)),
            std_dev_net: round_off_1_decimal(population_std_dev(&self.nets)),
            subjects: subject_averages,
        }
    }
}
