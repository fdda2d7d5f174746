use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;

use morpho_core::geometry::Point3;
use morpho_core::morphology::{
    Branch, BranchId, BranchKind, MorphoTree, RawSample, RawSamples, TreeError,
};
use tracing::{debug, trace};

use crate::{IoError, MorphologyLoader};

/// SWC 形态文件读取入口。
pub struct SwcFacade;

impl SwcFacade {
    pub fn new() -> Self {
        Self
    }

    /// 直接解析内存中的 SWC 文本。
    pub fn parse_str(&self, source: &str) -> Result<MorphoTree, IoError> {
        SwcParser::new(source)
            .parse()
            .map_err(|err| match err {
                SwcError::Invalid(message) => IoError::InvalidDocument(message),
                SwcError::Unsupported(message) => IoError::UnsupportedFeature(message),
            })
    }
}

impl Default for SwcFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl MorphologyLoader for SwcFacade {
    fn load(&self, path: &Path) -> Result<MorphoTree, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let tree = self.parse_str(&data)?;
        debug!(
            path = %path.display(),
            branches = tree.len(),
            samples = tree.raw_samples().len(),
            "loaded SWC morphology"
        );
        Ok(tree)
    }
}

#[derive(Debug)]
enum SwcError {
    /// 文本本身不合法。
    Invalid(String),
    /// 文本合法，但形态树无法表达。
    Unsupported(String),
}

impl SwcError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

impl From<TreeError> for SwcError {
    fn from(value: TreeError) -> Self {
        Self::invalid(format!("内部错误：{value}"))
    }
}

#[derive(Debug, Clone)]
struct Sample {
    kind: BranchKind,
    point: Point3,
    radius: f64,
    parent: Option<usize>,
}

struct SwcParser<'a> {
    reader: SwcReader<'a>,
}

impl<'a> SwcParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: SwcReader::new(source),
        }
    }

    fn parse(mut self) -> Result<MorphoTree, SwcError> {
        let mut samples: Vec<Sample> = Vec::new();
        let mut index_by_id: HashMap<i64, usize> = HashMap::new();

        while let Some(record) = self.reader.next_record()? {
            if index_by_id.contains_key(&record.id) {
                return Err(SwcError::invalid(format!(
                    "第 {} 行的采样编号 {} 重复",
                    record.line, record.id
                )));
            }
            let parent = if record.parent < 0 {
                None
            } else {
                // 父采样必须先于子采样出现，因此读入的结构不可能成环
                let index = index_by_id.get(&record.parent).copied().ok_or_else(|| {
                    SwcError::invalid(format!(
                        "第 {} 行的采样 {} 引用了未在其之前定义的父采样 {}",
                        record.line, record.id, record.parent
                    ))
                })?;
                Some(index)
            };
            let kind = BranchKind::from_swc_type(record.kind);
            // 胞体总是树根，无法挂在神经突之下
            if kind == BranchKind::Soma
                && parent.is_some_and(|index: usize| samples[index].kind != BranchKind::Soma)
            {
                return Err(SwcError::Unsupported(format!(
                    "第 {} 行的胞体采样 {} 挂在非胞体采样 {} 之下",
                    record.line, record.id, record.parent
                )));
            }
            index_by_id.insert(record.id, samples.len());
            samples.push(Sample {
                kind,
                point: record.point,
                radius: record.radius,
                parent,
            });
        }

        if samples.is_empty() {
            return Err(SwcError::invalid("SWC 文件不包含任何采样"));
        }

        let mut tree = assemble_tree(&samples)?;
        tree.set_raw_samples(RawSamples::new(
            samples
                .iter()
                .map(|sample| RawSample {
                    x: sample.point.x(),
                    y: sample.point.y(),
                    z: sample.point.z(),
                    diameter: sample.radius * 2.0,
                })
                .collect(),
        ));
        Ok(tree)
    }
}

/// 胞体采样合并为根分支；神经突在分叉处拆分为子分支。
/// 子分支以父分支末点开头，但挂在胞体上的分支不重复胞体采样。
fn assemble_tree(samples: &[Sample]) -> Result<MorphoTree, SwcError> {
    let is_soma = |index: usize| samples[index].kind == BranchKind::Soma;

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); samples.len()];
    for (index, sample) in samples.iter().enumerate() {
        if let Some(parent) = sample.parent {
            children[parent].push(index);
        }
    }

    let soma: Vec<usize> = (0..samples.len()).filter(|&i| is_soma(i)).collect();
    let root = Branch::new(
        BranchKind::Soma,
        soma.iter().map(|&i| samples[i].point).collect(),
        soma.iter().map(|&i| samples[i].radius).collect(),
    );
    let mut tree = MorphoTree::new(root);

    let mut pending: VecDeque<(BranchId, usize)> = samples
        .iter()
        .enumerate()
        .filter(|(index, sample)| {
            !is_soma(*index) && sample.parent.is_none_or(|parent| is_soma(parent))
        })
        .map(|(index, _)| (BranchId::ROOT, index))
        .collect();

    while let Some((parent_branch, start)) = pending.pop_front() {
        let mut points = Vec::new();
        let mut radii = Vec::new();
        if let Some(parent) = samples[start].parent.filter(|&p| !is_soma(p)) {
            points.push(samples[parent].point);
            radii.push(samples[parent].radius);
        }

        let mut current = start;
        loop {
            points.push(samples[current].point);
            radii.push(samples[current].radius);
            match children[current].as_slice() {
                [only] if !is_soma(*only) => current = *only,
                _ => break,
            }
        }

        let kind = samples[start].kind;
        let count = points.len();
        let branch = Branch::new(kind, points, radii);
        let id = tree.add_branch(parent_branch, branch)?;
        trace!(
            branch = id.get(),
            parent = parent_branch.get(),
            kind = kind.describe(),
            points = count,
            "assembled SWC branch"
        );
        pending.extend(
            children[current]
                .iter()
                .filter(|&&child| !is_soma(child))
                .map(|&child| (id, child)),
        );
    }

    Ok(tree)
}

struct SwcRecord {
    line: usize,
    id: i64,
    kind: i32,
    point: Point3,
    radius: f64,
    parent: i64,
}

struct SwcReader<'a> {
    lines: std::str::Lines<'a>,
    line_number: usize,
}

impl<'a> SwcReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            line_number: 0,
        }
    }

    fn next_record(&mut self) -> Result<Option<SwcRecord>, SwcError> {
        for raw in self.lines.by_ref() {
            self.line_number += 1;
            let content = raw.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }

            let fields: Vec<&str> = content.split_whitespace().collect();
            if fields.len() < 7 {
                return Err(SwcError::invalid(format!(
                    "第 {} 行只有 {} 个字段（期望 7 个：id type x y z radius parent）",
                    self.line_number,
                    fields.len()
                )));
            }
            let line = self.line_number;
            let context = |name: &str| format!("第 {line} 行的{name}");
            return Ok(Some(SwcRecord {
                line,
                id: parse_i64(fields[0], &context("采样编号"))?,
                kind: parse_i32(fields[1], &context("结构类型"))?,
                point: Point3::new(
                    parse_f64(fields[2], &context("X 坐标"))?,
                    parse_f64(fields[3], &context("Y 坐标"))?,
                    parse_f64(fields[4], &context("Z 坐标"))?,
                ),
                radius: parse_f64(fields[5], &context("半径"))?,
                parent: parse_i64(fields[6], &context("父采样编号"))?,
            }));
        }
        Ok(None)
    }
}

fn parse_f64(raw: &str, context: &str) -> Result<f64, SwcError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| SwcError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i32(raw: &str, context: &str) -> Result<i32, SwcError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| SwcError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i64(raw: &str, context: &str) -> Result<i64, SwcError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| SwcError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> MorphoTree {
        SwcFacade::new().parse_str(source).expect("parse SWC")
    }

    fn parse_err(source: &str) -> String {
        match SwcFacade::new().parse_str(source) {
            Err(IoError::InvalidDocument(message)) => message,
            other => panic!("expected invalid document, got {other:?}"),
        }
    }

    #[test]
    fn multi_sample_soma_becomes_root_branch() {
        let tree = parse(
            "# three point soma\n\
             1 1 0 0 0 2 -1\n\
             2 1 0 -2 0 2 1\n\
             3 1 0 2 0 2 1\n\
             4 3 0 5 0 1 3\n\
             5 3 0 8 0 1 4\n",
        );
        let root = tree.root();
        assert!(root.is_soma());
        assert_eq!(root.points().len(), 3);
        assert_eq!(root.children().len(), 1);

        let dendrite = tree.branch(root.children()[0]).unwrap();
        assert_eq!(dendrite.kind(), BranchKind::BasalDendrite);
        // 挂在胞体上的分支不包含胞体采样
        assert_eq!(
            dendrite.points(),
            &[Point3::new(0.0, 5.0, 0.0), Point3::new(0.0, 8.0, 0.0)]
        );
        assert_eq!(tree.raw_samples().len(), 5);
        assert!((tree.raw_samples().rows()[0].diameter - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bifurcation_splits_branches_and_repeats_parent_point() {
        let tree = parse(
            "1 1 0 0 0 5 -1\n\
             2 2 0 0 5 1 1\n\
             3 2 0 0 10 1 2\n\
             4 2 5 0 15 0.5 3\n\
             5 2 -5 0 15 0.5 3\n",
        );
        assert_eq!(tree.len(), 4);
        let trunk_id = tree.root().children()[0];
        let trunk = tree.branch(trunk_id).unwrap();
        assert_eq!(trunk.points().len(), 2);
        assert_eq!(trunk.children().len(), 2);

        let left = tree.branch(trunk.children()[0]).unwrap();
        assert_eq!(
            left.points(),
            &[Point3::new(0.0, 0.0, 10.0), Point3::new(5.0, 0.0, 15.0)]
        );
        assert_eq!(left.radii(), &[1.0, 0.5]);
        assert!(left.children().is_empty());
    }

    #[test]
    fn file_without_soma_gets_empty_soma_root() {
        let tree = parse("1 2 0 0 0 1 -1\n2 2 1 0 0 1 1\n");
        assert!(tree.root().is_soma());
        assert!(tree.root().points().is_empty());
        assert_eq!(tree.root().children().len(), 1);
        assert_eq!(tree.branch(tree.root().children()[0]).unwrap().points().len(), 2);
    }

    #[test]
    fn inline_comments_and_blank_lines_are_skipped() {
        let tree = parse("\n# header\n1 1 0 0 0 3 -1 # soma\n\n");
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.raw_samples().len(), 1);
    }

    #[test]
    fn short_line_is_rejected_with_line_number() {
        let message = parse_err("1 1 0 0 0 3 -1\n2 2 0 0\n");
        assert!(message.contains("第 2 行"), "{message}");
    }

    #[test]
    fn unparsable_coordinate_is_rejected() {
        let message = parse_err("1 1 0 abc 0 3 -1\n");
        assert!(message.contains("Y 坐标"), "{message}");
    }

    #[test]
    fn forward_parent_reference_is_rejected() {
        let message = parse_err("1 1 0 0 0 3 -1\n2 2 0 0 1 1 3\n3 2 0 0 2 1 1\n");
        assert!(message.contains("父采样 3"), "{message}");
    }

    #[test]
    fn duplicate_sample_id_is_rejected() {
        let message = parse_err("1 1 0 0 0 3 -1\n1 2 0 0 1 1 -1\n");
        assert!(message.contains("重复"), "{message}");
    }

    #[test]
    fn soma_below_neurite_is_unsupported() {
        let source = "1 1 0 0 0 3 -1\n2 3 0 0 4 1 1\n3 1 0 0 8 2 2\n";
        let result = SwcFacade::new().parse_str(source);
        match result {
            Err(IoError::UnsupportedFeature(message)) => {
                assert!(message.contains("第 3 行"), "{message}");
            }
            other => panic!("expected unsupported feature, got {other:?}"),
        }
    }

    #[test]
    fn soma_chain_is_accepted() {
        let tree = parse("1 1 0 0 0 3 -1\n2 1 0 2 0 3 1\n3 1 0 4 0 3 2\n");
        assert_eq!(tree.root().points().len(), 3);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn empty_file_is_rejected() {
        let message = parse_err("# nothing here\n");
        assert!(message.contains("不包含任何采样"), "{message}");
    }
}
