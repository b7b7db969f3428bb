//! Marker gene graders: ranked-list precision/recall and per-gene separation

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Deserialize;
use serde_json::Value;

use super::Grader;
use crate::fields::{as_number, mark, parse_config, string_list, verdict};
use crate::{AgentAnswer, GraderError, GraderKind, GraderOutcome, GraderResult, Metrics};

const TOP_GENES_FIELD: &str = "top_marker_genes";
const PER_GENE_FIELD: &str = "per_gene_stats";
const MEAN_FIELD: &str = "mean_auroc";

/// Tolerance when cross-checking the reported mean against the computed one
const MEAN_MISMATCH: f64 = 0.001;

#[derive(Debug, Default, Deserialize)]
struct PrecisionRecallConfig {
    #[serde(default)]
    canonical_markers: Vec<String>,
    #[serde(default)]
    scoring: Scoring<PrecisionRecallThresholds>,
}

#[derive(Debug, Default, Deserialize)]
struct Scoring<T: Default> {
    #[serde(default)]
    pass_thresholds: T,
}

#[derive(Debug, Deserialize)]
struct PrecisionRecallThresholds {
    #[serde(default = "default_precision")]
    precision_at_k: f64,
    #[serde(default = "default_recall")]
    recall_at_k: f64,
}

impl Default for PrecisionRecallThresholds {
    fn default() -> Self {
        Self {
            precision_at_k: default_precision(),
            recall_at_k: default_recall(),
        }
    }
}

fn default_precision() -> f64 {
    0.60
}

fn default_recall() -> f64 {
    0.50
}

/// Scores a predicted top-k marker list against canonical markers.
/// Gene symbols are compared case-insensitively.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkerGenePrecisionRecallGrader;

impl Grader for MarkerGenePrecisionRecallGrader {
    fn kind(&self) -> GraderKind {
        GraderKind::MarkerGenePrecisionRecall
    }

    fn evaluate_answer(&self, answer: &AgentAnswer, config: &Value) -> GraderOutcome<GraderResult> {
        let config: PrecisionRecallConfig = parse_config(config)?;
        let thresholds = &config.scoring.pass_thresholds;

        let Some(predicted) = answer.get(TOP_GENES_FIELD) else {
            return Ok(GraderResult::missing_field(TOP_GENES_FIELD, answer));
        };
        let predicted = string_list(predicted, TOP_GENES_FIELD)?;
        let k = predicted.len();

        // Lowercased symbol -> spelling as written; later duplicates win
        let predicted_case: HashMap<String, &String> =
            predicted.iter().map(|g| (g.to_lowercase(), g)).collect();
        let canonical_case: HashMap<String, &String> = config
            .canonical_markers
            .iter()
            .map(|g| (g.to_lowercase(), g))
            .collect();

        let predicted_set: BTreeSet<&String> = predicted_case.keys().collect();
        let canonical_set: BTreeSet<&String> = canonical_case.keys().collect();

        let tp_keys: Vec<&String> = canonical_set.intersection(&predicted_set).copied().collect();
        let fp_keys: Vec<&String> = predicted_set.difference(&canonical_set).copied().collect();
        let fn_keys: Vec<&String> = canonical_set.difference(&predicted_set).copied().collect();

        let precision = if k > 0 {
            tp_keys.len() as f64 / k as f64
        } else {
            0.0
        };
        let recall = if !canonical_set.is_empty() {
            tp_keys.len() as f64 / canonical_set.len() as f64
        } else {
            0.0
        };

        let precision_pass = precision >= thresholds.precision_at_k;
        let recall_pass = recall >= thresholds.recall_at_k;
        let passed = precision_pass && recall_pass;

        let true_positives = spelled(&tp_keys, &predicted_case, &canonical_case);
        let false_positives = spelled(&fp_keys, &predicted_case, &canonical_case);
        let false_negatives = spelled(&fn_keys, &canonical_case, &canonical_case);

        let mut metrics = Metrics::new();
        metrics.insert("k".into(), Value::from(k));
        metrics.insert("precision_at_k".into(), Value::from(precision));
        metrics.insert("recall_at_k".into(), Value::from(recall));
        metrics.insert("precision_threshold".into(), Value::from(thresholds.precision_at_k));
        metrics.insert("recall_threshold".into(), Value::from(thresholds.recall_at_k));
        metrics.insert("true_positives".into(), serde_json::to_value(&true_positives)?);
        metrics.insert("false_positives".into(), serde_json::to_value(&false_positives)?);
        metrics.insert("false_negatives".into(), serde_json::to_value(&false_negatives)?);
        metrics.insert("num_true_positives".into(), Value::from(tp_keys.len()));
        metrics.insert("num_false_positives".into(), Value::from(fp_keys.len()));
        metrics.insert("num_false_negatives".into(), Value::from(fn_keys.len()));
        metrics.insert("num_canonical_markers".into(), Value::from(canonical_set.len()));
        metrics.insert("precision_pass".into(), Value::Bool(precision_pass));
        metrics.insert("recall_pass".into(), Value::Bool(recall_pass));

        let mut lines = vec![
            format!("Marker Gene Precision/Recall: {}", verdict(passed)),
            String::new(),
            format!(
                "Precision@{}: {:.3} {} (threshold: {:.3})",
                k,
                precision,
                mark(precision_pass),
                thresholds.precision_at_k
            ),
            format!(
                "Recall@{}: {:.3} {} (threshold: {:.3})",
                k,
                recall,
                mark(recall_pass),
                thresholds.recall_at_k
            ),
        ];
        gene_section(&mut lines, "True Positives", "✓", &true_positives);
        gene_section(&mut lines, "False Positives", "+", &false_positives);
        gene_section(&mut lines, "False Negatives", "-", &false_negatives);

        lines.push(String::new());
        lines.push(format!("Result: {}", verdict(passed)));
        if !passed {
            let mut reasons = Vec::new();
            if !precision_pass {
                reasons.push(format!(
                    "Precision {:.3} < {:.3}",
                    precision, thresholds.precision_at_k
                ));
            }
            if !recall_pass {
                reasons.push(format!("Recall {:.3} < {:.3}", recall, thresholds.recall_at_k));
            }
            lines.push(format!("Reasons: {}", reasons.join("; ")));
        }

        Ok(GraderResult::graded(passed, metrics, lines.join("\n"), answer))
    }
}

/// Map lowercased keys back to a spelling the agent or config used, sorted
fn spelled(
    keys: &[&String],
    primary: &HashMap<String, &String>,
    fallback: &HashMap<String, &String>,
) -> Vec<String> {
    let mut genes: Vec<String> = keys
        .iter()
        .map(|key| {
            primary
                .get(*key)
                .or_else(|| fallback.get(*key))
                .map(|gene| gene.to_string())
                .unwrap_or_else(|| key.to_string())
        })
        .collect();
    genes.sort();
    genes
}

fn gene_section(lines: &mut Vec<String>, title: &str, bullet: &str, genes: &[String]) {
    lines.push(String::new());
    lines.push(format!("{} ({}):", title, genes.len()));
    if genes.is_empty() {
        lines.push("  None".to_string());
    } else {
        lines.extend(genes.iter().map(|g| format!("  {} {}", bullet, g)));
    }
}

#[derive(Debug, Default, Deserialize)]
struct SeparationConfig {
    #[serde(default)]
    scoring: Scoring<SeparationThresholds>,
}

#[derive(Debug, Deserialize)]
struct SeparationThresholds {
    #[serde(default = "default_mean_auroc")]
    mean_auroc: f64,
    #[serde(default = "default_fraction_high")]
    fraction_high: f64,
    #[serde(default = "default_per_gene_cutoff")]
    per_gene_cutoff: f64,
}

impl Default for SeparationThresholds {
    fn default() -> Self {
        Self {
            mean_auroc: default_mean_auroc(),
            fraction_high: default_fraction_high(),
            per_gene_cutoff: default_per_gene_cutoff(),
        }
    }
}

fn default_mean_auroc() -> f64 {
    0.85
}

fn default_fraction_high() -> f64 {
    0.70
}

fn default_per_gene_cutoff() -> f64 {
    0.80
}

/// Judges how well reported marker genes separate the target population.
///
/// The pass decision uses the agent-reported mean AUROC. The mean recomputed
/// from the per-gene scores is exposed as `mean_auroc_computed` and noted in
/// the reasoning when the two disagree.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkerGeneSeparationGrader;

impl Grader for MarkerGeneSeparationGrader {
    fn kind(&self) -> GraderKind {
        GraderKind::MarkerGeneSeparation
    }

    fn evaluate_answer(&self, answer: &AgentAnswer, config: &Value) -> GraderOutcome<GraderResult> {
        let config: SeparationConfig = parse_config(config)?;
        let thresholds = &config.scoring.pass_thresholds;

        let Some(per_gene_stats) = answer.get(PER_GENE_FIELD) else {
            return Ok(GraderResult::missing_field(PER_GENE_FIELD, answer));
        };
        let Some(reported_mean) = answer.get(MEAN_FIELD) else {
            return Ok(GraderResult::missing_field(MEAN_FIELD, answer));
        };

        let Some(stats) = per_gene_stats.as_array() else {
            return Ok(GraderResult::rejected(
                "per_gene_stats must be a list",
                Some(answer),
            ));
        };
        if stats.is_empty() {
            return Ok(GraderResult::rejected("per_gene_stats is empty", Some(answer)));
        }
        let reported_mean = as_number(reported_mean, MEAN_FIELD)?;

        let mut scores: BTreeMap<String, f64> = BTreeMap::new();
        for stat in stats {
            let Some(stat) = stat.as_object() else {
                return Ok(GraderResult::rejected(
                    "Each element in per_gene_stats must be a dict with 'gene' and 'auroc'",
                    Some(answer),
                ));
            };
            let (Some(gene), Some(auroc)) = (stat.get("gene"), stat.get("auroc")) else {
                return Ok(GraderResult::rejected(
                    "Each element in per_gene_stats must have 'gene' and 'auroc' fields",
                    Some(answer),
                ));
            };
            let gene = gene
                .as_str()
                .ok_or_else(|| GraderError::invalid_field("per_gene_stats.gene", "a string"))?;
            scores.insert(gene.to_string(), as_number(auroc, "per_gene_stats.auroc")?);
        }

        let num_genes = stats.len();
        let computed_mean = scores.values().sum::<f64>() / scores.len() as f64;

        let (high, low): (Vec<&String>, Vec<&String>) = scores
            .keys()
            .partition(|gene| scores[*gene] >= thresholds.per_gene_cutoff);
        let fraction_high = high.len() as f64 / num_genes as f64;

        let mean_pass = reported_mean >= thresholds.mean_auroc;
        let fraction_pass = fraction_high >= thresholds.fraction_high;
        let passed = mean_pass && fraction_pass;

        let mut metrics = Metrics::new();
        metrics.insert("num_genes".into(), Value::from(num_genes));
        metrics.insert("mean_auroc_agent".into(), Value::from(reported_mean));
        metrics.insert("mean_auroc_computed".into(), Value::from(computed_mean));
        metrics.insert("mean_auroc_threshold".into(), Value::from(thresholds.mean_auroc));
        metrics.insert("fraction_high".into(), Value::from(fraction_high));
        metrics.insert(
            "fraction_high_threshold".into(),
            Value::from(thresholds.fraction_high),
        );
        metrics.insert("per_gene_cutoff".into(), Value::from(thresholds.per_gene_cutoff));
        metrics.insert("num_high_auroc_genes".into(), Value::from(high.len()));
        metrics.insert("num_low_auroc_genes".into(), Value::from(low.len()));
        metrics.insert("high_auroc_genes".into(), serde_json::to_value(&high)?);
        metrics.insert("low_auroc_genes".into(), serde_json::to_value(&low)?);
        metrics.insert("mean_auroc_pass".into(), Value::Bool(mean_pass));
        metrics.insert("fraction_high_pass".into(), Value::Bool(fraction_pass));
        metrics.insert("per_gene_aurocs".into(), serde_json::to_value(&scores)?);

        let mut lines = vec![
            format!("Marker Gene Separation: {}", verdict(passed)),
            String::new(),
            format!(
                "Mean AUROC: {:.3} {} (threshold: {:.3})",
                reported_mean,
                mark(mean_pass),
                thresholds.mean_auroc
            ),
            format!(
                "Fraction High AUROC (≥{:.2}): {:.3} ({}/{}) {} (threshold: {:.3})",
                thresholds.per_gene_cutoff,
                fraction_high,
                high.len(),
                num_genes,
                mark(fraction_pass),
                thresholds.fraction_high
            ),
            String::new(),
            "Per-gene AUROC scores:".to_string(),
        ];

        let mut ranked: Vec<(&String, f64)> = scores.iter().map(|(g, s)| (g, *s)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        lines.extend(ranked.iter().map(|(gene, score)| {
            format!(
                "  {} {}: {:.3}",
                mark(*score >= thresholds.per_gene_cutoff),
                gene,
                score
            )
        }));

        if (reported_mean - computed_mean).abs() > MEAN_MISMATCH {
            lines.push(String::new());
            lines.push(format!(
                "Note: Agent reported mean {:.3}, computed mean is {:.3}",
                reported_mean, computed_mean
            ));
        }

        lines.push(String::new());
        lines.push(format!("Result: {}", verdict(passed)));
        if !passed {
            let mut reasons = Vec::new();
            if !mean_pass {
                reasons.push(format!(
                    "Mean AUROC {:.3} < {:.3}",
                    reported_mean, thresholds.mean_auroc
                ));
            }
            if !fraction_pass {
                reasons.push(format!(
                    "Fraction high {:.3} < {:.3}",
                    fraction_high, thresholds.fraction_high
                ));
            }
            lines.push(format!("Reasons: {}", reasons.join("; ")));
        }

        Ok(GraderResult::graded(passed, metrics, lines.join("\n"), answer))
    }
}
