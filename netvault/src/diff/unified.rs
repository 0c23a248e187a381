//! Line-based unified diff (Myers' O(ND) algorithm, linear space).
//!
//! Output follows the classic `diff -u` layout: `---`/`+++` file headers,
//! `@@ -a,b +c,d @@` hunk markers, and ` `/`-`/`+` body lines. Within each
//! changed region removals are listed before additions.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::ops::{Index, IndexMut, Range};

/// Default number of context lines around each change.
pub const DEFAULT_CONTEXT: usize = 3;

/// A rendered diff with its change counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifiedDiff {
    /// Diff body, empty when the inputs have identical lines.
    pub text: String,
    /// Lines present only in the new text.
    pub added: usize,
    /// Lines present only in the old text.
    pub removed: usize,
}

impl UnifiedDiff {
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal,
    Delete,
    Insert,
}

/// One step of the edit script with the line positions before it.
#[derive(Debug, Clone, Copy)]
struct Edit {
    op: Op,
    old: usize,
    new: usize,
}

/// Diff `old` against `new` line by line.
pub fn unified_diff(old: &str, new: &str, from: &str, to: &str, context: usize) -> UnifiedDiff {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();
    let script = edit_script(&a, &b);

    let added = script.iter().filter(|e| e.op == Op::Insert).count();
    let removed = script.iter().filter(|e| e.op == Op::Delete).count();
    if added == 0 && removed == 0 {
        return UnifiedDiff::default();
    }

    let mut text = String::new();
    let _ = writeln!(text, "--- {}", from);
    let _ = writeln!(text, "+++ {}", to);

    for (start, end) in hunk_ranges(&script, context) {
        let hunk = &script[start..end];
        let old_len = hunk.iter().filter(|e| e.op != Op::Insert).count();
        let new_len = hunk.iter().filter(|e| e.op != Op::Delete).count();
        let _ = writeln!(
            text,
            "@@ -{} +{} @@",
            format_range(hunk[0].old, old_len),
            format_range(hunk[0].new, new_len)
        );
        for edit in hunk {
            let (marker, line) = match edit.op {
                Op::Equal => (' ', a[edit.old]),
                Op::Delete => ('-', a[edit.old]),
                Op::Insert => ('+', b[edit.new]),
            };
            text.push(marker);
            text.push_str(line);
            text.push('\n');
        }
    }

    UnifiedDiff {
        text,
        added,
        removed,
    }
}

/// `start,len` with the 1-based start; a single line omits the length and
/// an empty range points at the line before it.
fn format_range(start: usize, len: usize) -> String {
    match len {
        0 => format!("{},0", start),
        1 => format!("{}", start + 1),
        _ => format!("{},{}", start + 1, len),
    }
}

/// Group the script into hunks: every change plus up to `context` equal
/// lines on each side, merging changes separated by at most `2 * context`
/// equal lines.
fn hunk_ranges(script: &[Edit], context: usize) -> Vec<(usize, usize)> {
    let changes: Vec<usize> = script
        .iter()
        .enumerate()
        .filter(|(_, e)| e.op != Op::Equal)
        .map(|(i, _)| i)
        .collect();

    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for index in changes {
        let start = index.saturating_sub(context);
        let end = (index + 1 + context).min(script.len());
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = end,
            _ => ranges.push((start, end)),
        }
    }
    ranges
}

/// Shortest edit script between `a` and `b`.
///
/// Lines are interned to integer ids first. The search is the linear-space
/// variant of Myers: find the middle snake, recurse on both halves.
fn edit_script(a: &[&str], b: &[&str]) -> Vec<Edit> {
    let (old, new) = intern(a, b);
    let max_d = (old.len() + new.len()).div_ceil(2) + 1;
    let mut myers = Myers {
        old: &old,
        new: &new,
        forward: Frontier::new(max_d),
        backward: Frontier::new(max_d),
        script: Vec::with_capacity(old.len().max(new.len())),
    };
    myers.conquer(0..old.len(), 0..new.len());

    let mut script = myers.script;
    group_changes(&mut script);
    script
}

fn intern<'a>(a: &[&'a str], b: &[&'a str]) -> (Vec<usize>, Vec<usize>) {
    let mut ids: HashMap<&'a str, usize> = HashMap::new();
    let mut id_of = |line: &'a str| {
        let next = ids.len();
        *ids.entry(line).or_insert(next)
    };
    let old = a.iter().map(|&line| id_of(line)).collect();
    let new = b.iter().map(|&line| id_of(line)).collect();
    (old, new)
}

/// Furthest-reaching x per diagonal `k`, for `-max_d <= k <= max_d`.
struct Frontier {
    offset: isize,
    x: Vec<usize>,
}

impl Frontier {
    fn new(max_d: usize) -> Self {
        Self {
            offset: max_d as isize,
            x: vec![0; 2 * max_d + 2],
        }
    }
}

impl Index<isize> for Frontier {
    type Output = usize;

    fn index(&self, k: isize) -> &usize {
        &self.x[(k + self.offset) as usize]
    }
}

impl IndexMut<isize> for Frontier {
    fn index_mut(&mut self, k: isize) -> &mut usize {
        &mut self.x[(k + self.offset) as usize]
    }
}

struct Myers<'a> {
    old: &'a [usize],
    new: &'a [usize],
    forward: Frontier,
    backward: Frontier,
    script: Vec<Edit>,
}

impl Myers<'_> {
    fn conquer(&mut self, mut old: Range<usize>, mut new: Range<usize>) {
        let prefix = common_prefix(&self.old[old.clone()], &self.new[new.clone()]);
        for i in 0..prefix {
            self.push(Op::Equal, old.start + i, new.start + i);
        }
        old.start += prefix;
        new.start += prefix;

        let suffix = common_suffix(&self.old[old.clone()], &self.new[new.clone()]);
        old.end -= suffix;
        new.end -= suffix;

        let split = if old.is_empty() || new.is_empty() {
            None
        } else {
            self.middle_snake(&old, &new)
        };
        match split {
            Some((x, y)) => {
                self.conquer(old.start..x, new.start..y);
                self.conquer(x..old.end, y..new.end);
            }
            None => self.replace(old.clone(), new.clone()),
        }

        for i in 0..suffix {
            self.push(Op::Equal, old.end + i, new.end + i);
        }
    }

    /// Point where a shortest path crosses the middle diagonal band.
    fn middle_snake(&mut self, old: &Range<usize>, new: &Range<usize>) -> Option<(usize, usize)> {
        let n = old.len();
        let m = new.len();
        let delta = n as isize - m as isize;
        let odd = delta & 1 == 1;
        let d_max = (n + m).div_ceil(2) + 1;

        self.forward[1] = 0;
        self.backward[1] = 0;

        for d in 0..d_max as isize {
            for k in (-d..=d).rev().step_by(2) {
                let f = &self.forward;
                let mut x = if k == -d || (k != d && f[k - 1] < f[k + 1]) {
                    f[k + 1]
                } else {
                    f[k - 1] + 1
                };
                let y = (x as isize - k) as usize;
                let (x0, y0) = (x, y);
                if x < n && y < m {
                    x += common_prefix(
                        &self.old[old.start + x..old.end],
                        &self.new[new.start + y..new.end],
                    );
                }
                self.forward[k] = x;
                if odd && (k - delta).abs() < d && x + self.backward[delta - k] >= n {
                    return Some((old.start + x0, new.start + y0));
                }
            }

            for k in (-d..=d).rev().step_by(2) {
                let b = &self.backward;
                let mut x = if k == -d || (k != d && b[k - 1] < b[k + 1]) {
                    b[k + 1]
                } else {
                    b[k - 1] + 1
                };
                let mut y = (x as isize - k) as usize;
                if x < n && y < m {
                    let advance = common_suffix(
                        &self.old[old.start..old.start + n - x],
                        &self.new[new.start..new.start + m - y],
                    );
                    x += advance;
                    y += advance;
                }
                self.backward[k] = x;
                if !odd && (k - delta).abs() <= d && x + self.forward[delta - k] >= n {
                    return Some((old.start + n - x, new.start + m - y));
                }
            }
        }
        None
    }

    /// Delete every line of `old`, then insert every line of `new`.
    fn replace(&mut self, old: Range<usize>, new: Range<usize>) {
        for i in old.clone() {
            self.push(Op::Delete, i, new.start);
        }
        for j in new {
            self.push(Op::Insert, old.end, j);
        }
    }

    fn push(&mut self, op: Op, old: usize, new: usize) {
        self.script.push(Edit { op, old, new });
    }
}

fn common_prefix(a: &[usize], b: &[usize]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[usize], b: &[usize]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Reorder each run of changes so deletions precede insertions, and
/// recompute positions.
fn group_changes(script: &mut [Edit]) {
    let mut start = 0;
    while start < script.len() {
        if script[start].op == Op::Equal {
            start += 1;
            continue;
        }
        let end = script[start..]
            .iter()
            .position(|e| e.op == Op::Equal)
            .map_or(script.len(), |offset| start + offset);

        let (mut old, mut new) = (script[start].old, script[start].new);
        let run = &mut script[start..end];
        run.sort_by_key(|e| match e.op {
            Op::Delete => 0,
            _ => 1,
        });
        for edit in run.iter_mut() {
            edit.old = old;
            edit.new = new;
            match edit.op {
                Op::Delete => old += 1,
                Op::Insert => new += 1,
                Op::Equal => {}
            }
        }
        start = end;
    }
}
