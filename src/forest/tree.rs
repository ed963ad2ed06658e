//! Isolation Tree
//!
//! ノードは配列（アリーナ）に格納し、子はインデックスで参照する。

use ndarray::{Array2, ArrayView1};
use rand::Rng;

/// Euler-Mascheroni 定数
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone)]
enum Node {
    Internal {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// ランダム分割による隔離木
#[derive(Debug, Clone)]
pub struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    /// サブサンプル（行インデックス）から木を構築
    pub fn build<R: Rng + ?Sized>(
        data: &Array2<f64>,
        rows: Vec<usize>,
        height_limit: usize,
        rng: &mut R,
    ) -> Self {
        let mut nodes = Vec::with_capacity(rows.len() * 2);
        grow(data, rows, 0, height_limit, rng, &mut nodes);
        Self { nodes }
    }

    /// 経路長 h(x)（外部ノードでは c(size) を加算）
    pub fn path_length(&self, x: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }

    /// ノード数
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// 分割を持たない（1ノードのみの）木か
    pub fn is_trivial(&self) -> bool {
        self.nodes.len() == 1
    }
}

fn grow<R: Rng + ?Sized>(
    data: &Array2<f64>,
    rows: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut R,
    nodes: &mut Vec<Node>,
) -> usize {
    let idx = nodes.len();
    nodes.push(Node::Leaf { size: rows.len() });

    if depth >= height_limit || rows.len() <= 1 {
        return idx;
    }

    // 値に幅のある特徴量のみ分割候補にする
    let splittable: Vec<(usize, f64, f64)> = (0..data.ncols())
        .filter_map(|feature| {
            let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                let v = data[[r, feature]];
                (lo.min(v), hi.max(v))
            });
            (max > min).then_some((feature, min, max))
        })
        .collect();

    if splittable.is_empty() {
        return idx;
    }

    let (feature, min, max) = splittable[rng.gen_range(0..splittable.len())];
    let threshold = rng.gen_range(min..max);
    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
        rows.into_iter().partition(|&r| data[[r, feature]] < threshold);

    let left = grow(data, left_rows, depth + 1, height_limit, rng, nodes);
    let right = grow(data, right_rows, depth + 1, height_limit, rng, nodes);
    nodes[idx] = Node::Internal {
        feature,
        threshold,
        left,
        right,
    };
    idx
}

/// 二分探索木の不成功探索の平均経路長 c(n)
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) ≈ 10.24
        assert!((average_path_length(256) - 10.244).abs() < 0.01);
    }

    #[test]
    fn test_constant_data_builds_single_leaf() {
        let data = array![[1.0, 2.0], [1.0, 2.0], [1.0, 2.0]];
        let mut rng = StdRng::seed_from_u64(7);
        let tree = IsolationTree::build(&data, vec![0, 1, 2], 8, &mut rng);

        assert!(tree.is_trivial());
        assert!((tree.path_length(data.row(0)) - average_path_length(3)).abs() < 1e-12);
    }

    #[test]
    fn test_outlier_isolated_quickly() {
        let mut rows: Vec<[f64; 2]> = (0..63).map(|i| [(i % 8) as f64 * 0.1, (i / 8) as f64 * 0.1]).collect();
        rows.push([50.0, 50.0]);
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let data = Array2::from_shape_vec((64, 2), flat).unwrap();

        let mut rng = StdRng::seed_from_u64(42);
        let mut outlier_depth = 0.0;
        let mut inlier_depth = 0.0;
        for _ in 0..50 {
            let tree = IsolationTree::build(&data, (0..64).collect(), 6, &mut rng);
            outlier_depth += tree.path_length(data.row(63));
            inlier_depth += tree.path_length(data.row(27));
        }

        assert!(outlier_depth < inlier_depth);
    }
}
