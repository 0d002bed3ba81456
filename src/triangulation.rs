//! Delaunay triangulation of scattered planar points.
//!
//! The triangulation is built in two passes: a lexicographic sweep that
//! produces some triangulation of the convex hull, then Lawson edge flips
//! until every interior edge is locally Delaunay. Point counts are small
//! (at most `MAX_SCATTER_POINTS`), so the quadratic flip pass is fine.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::errors::SurfaceError;

/// Tolerance for orientation tests, in per-axis box coordinates.
const ORIENT_EPS: f64 = 1e-12;
/// Tolerance for in-circle tests, in unit-box coordinates.
const INCIRCLE_EPS: f64 = 1e-12;
/// Barycentric slack accepted by point location, so hull edges count as inside.
const LOCATE_EPS: f64 = 1e-10;
const MAX_FLIPS: usize = 1_000_000;

#[inline]
fn orient(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64
{
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// Positive when `d` lies strictly inside the circumcircle of the
/// counter-clockwise triangle `(a, b, c)`.
#[inline]
fn in_circle(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> f64
{
    let (adx, ady) = (a[0] - d[0], a[1] - d[1]);
    let (bdx, bdy) = (b[0] - d[0], b[1] - d[1]);
    let (cdx, cdy) = (c[0] - d[0], c[1] - d[1]);
    let ad = adx * adx + ady * ady;
    let bd = bdx * bdx + bdy * bdy;
    let cd = cdx * cdx + cdy * cdy;
    adx * (bdy * cd - bd * cdy) - ady * (bdx * cd - bd * cdx) + ad * (bdx * cdy - bdy * cdx)
}

#[derive(Clone, Debug)]
pub struct Triangulation
{
    points: Vec<[f64; 2]>,
    /// Points mapped into the unit box with one common scale, used for in-circle tests.
    unit: Vec<[f64; 2]>,
    /// Counter-clockwise vertex triples.
    triangles: Vec<[usize; 3]>,
    /// `neighbors[t][k]` is the triangle across the edge opposite vertex `k`.
    neighbors: Vec<[Option<usize>; 3]>,
    vertex_neighbors: Vec<Vec<usize>>,
}

impl Triangulation
{
    ///
    /// Triangulate `points`. Repeated positions are used once: the first
    /// occurrence becomes the vertex and later copies are left out of every
    /// triangle. Vertex indices in the result refer to `points`.
    ///
    pub fn new(points: &[[f64; 2]]) -> Result<Self, SurfaceError>
    {
        let unit = to_unit_box(points, true);
        // orientation signs survive per-axis scaling, so thin sets keep their area
        let boxed = to_unit_box(points, false);
        let mut order: Vec<usize> = (0..points.len()).collect();
        // adding 0.0 folds -0.0 into 0.0 so equal positions end up adjacent
        let key = |i: usize| [points[i][0] + 0.0, points[i][1] + 0.0];
        // stable, so the lowest index of a repeated position comes first
        order.sort_by(|&a, &b| key(a)[0].total_cmp(&key(b)[0]).then(key(a)[1].total_cmp(&key(b)[1])));
        order.dedup_by(|b, a| points[*a] == points[*b]);
        if order.len() < 3
        {
            return Err(SurfaceError::InsufficientPoints(order.len()));
        }

        let mut triangles = sweep(&boxed, &order)?;
        let flips = legalize(&unit, &boxed, &mut triangles);
        let neighbors = build_neighbors(&triangles);
        let vertex_neighbors = build_vertex_neighbors(points.len(), &triangles);
        debug!(vertices = order.len(), triangles = triangles.len(), flips, "triangulation built");
        Ok(Self { points: points.to_vec(), unit, triangles, neighbors, vertex_neighbors })
    }

    pub fn points(&self) -> &[[f64; 2]]
    {
        &self.points
    }

    pub fn triangles(&self) -> &[[usize; 3]]
    {
        &self.triangles
    }

    pub fn neighbors(&self) -> &[[Option<usize>; 3]]
    {
        &self.neighbors
    }

    /// Vertices sharing an edge with vertex `v`, ascending. Empty for unused points.
    pub fn vertex_neighbors(&self, v: usize) -> &[usize]
    {
        &self.vertex_neighbors[v]
    }

    pub fn len(&self) -> usize
    {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.triangles.is_empty()
    }

    /// Centroid of triangle `t` in input coordinates.
    pub fn centroid(&self, t: usize) -> [f64; 2]
    {
        let [a, b, c] = self.triangles[t].map(|v| self.points[v]);
        [(a[0] + b[0] + c[0]) / 3.0, (a[1] + b[1] + c[1]) / 3.0]
    }

    /// Barycentric coordinates of `point` with respect to triangle `t`.
    pub fn barycentric(&self, t: usize, point: [f64; 2]) -> [f64; 3]
    {
        let [a, b, c] = self.triangles[t].map(|v| self.points[v]);
        let det = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
        let l1 = ((b[1] - c[1]) * (point[0] - c[0]) + (c[0] - b[0]) * (point[1] - c[1])) / det;
        let l2 = ((c[1] - a[1]) * (point[0] - c[0]) + (a[0] - c[0]) * (point[1] - c[1])) / det;
        [l1, l2, 1.0 - l1 - l2]
    }

    ///
    /// First triangle containing `point`, with its barycentric coordinates.
    /// `None` outside the convex hull.
    ///
    pub fn locate(&self, point: [f64; 2]) -> Option<(usize, [f64; 3])>
    {
        (0..self.triangles.len()).find_map(|t|
        {
            let b = self.barycentric(t, point);
            if b.iter().all(|&l| l >= -LOCATE_EPS)
            {
                Some((t, b))
            }
            else
            {
                None
            }
        })
    }

    /// True when every interior edge satisfies the empty-circumcircle condition.
    pub fn is_delaunay(&self) -> bool
    {
        for (t, tri) in self.triangles.iter().enumerate()
        {
            for k in 0..3
            {
                if let Some(u) = self.neighbors[t][k]
                {
                    let a = tri[(k + 1) % 3];
                    let b = tri[(k + 2) % 3];
                    let Some(d) = self.triangles[u].iter().copied().find(|&v| v != a && v != b) else { continue; };
                    let [p, q, r] = tri.map(|v| self.unit[v]);
                    if in_circle(p, q, r, self.unit[d]) > INCIRCLE_EPS
                    {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// Map `points` into [0, 1]^2, with one scale for both axes when `uniform`.
fn to_unit_box(points: &[[f64; 2]], uniform: bool) -> Vec<[f64; 2]>
{
    let mut lower = [f64::INFINITY; 2];
    let mut upper = [f64::NEG_INFINITY; 2];
    for p in points
    {
        for d in 0..2
        {
            lower[d] = lower[d].min(p[d]);
            upper[d] = upper[d].max(p[d]);
        }
    }
    let valid = |s: f64| if s > 0.0 && s.is_finite() { s } else { 1.0 };
    let mut scale = [valid(upper[0] - lower[0]), valid(upper[1] - lower[1])];
    if uniform
    {
        let common = valid((upper[0] - lower[0]).max(upper[1] - lower[1]));
        scale = [common, common];
    }
    points.iter().map(|p| [(p[0] - lower[0]) / scale[0], (p[1] - lower[1]) / scale[1]]).collect()
}

///
/// Sweep the lexicographically sorted points, attaching each new point to
/// every hull edge it can see. The result covers the convex hull but is not
/// yet Delaunay.
///
fn sweep(unit: &[[f64; 2]], order: &[usize]) -> Result<Vec<[usize; 3]>, SurfaceError>
{
    let (s0, s1) = (order[0], order[1]);
    let m = (2..order.len())
        .find(|&i| orient(unit[s0], unit[s1], unit[order[i]]).abs() > ORIENT_EPS)
        .ok_or(SurfaceError::DegenerateGeometry)?;
    let apex = order[m];

    let mut triangles = Vec::with_capacity(2 * order.len());
    for pair in order[..m].windows(2)
    {
        let (a, b) = (pair[0], pair[1]);
        if orient(unit[a], unit[b], unit[apex]) > 0.0
        {
            triangles.push([a, b, apex]);
        }
        else
        {
            triangles.push([b, a, apex]);
        }
    }

    let mut hull: Vec<usize> = if orient(unit[s0], unit[order[m - 1]], unit[apex]) > 0.0
    {
        order[..m].iter().copied().chain(std::iter::once(apex)).collect()
    }
    else
    {
        std::iter::once(s0).chain(std::iter::once(apex)).chain(order[1..m].iter().rev().copied()).collect()
    };

    for &p in &order[m + 1..]
    {
        let n = hull.len();
        let sides: Vec<f64> = (0..n).map(|i| orient(unit[hull[i]], unit[hull[(i + 1) % n]], unit[p])).collect();
        let mut visible: Vec<bool> = sides.iter().map(|&s| s < -ORIENT_EPS).collect();
        if !visible.iter().any(|&v| v)
        {
            // nearly on the hull line; attach to the edge it is most outside of
            let (best, side) = sides.iter().copied().enumerate().min_by(|a, b| a.1.total_cmp(&b.1)).unwrap_or((0, 0.0));
            if side >= 0.0
            {
                debug!(vertex = p, "point not outside hull, left out of triangulation");
                continue;
            }
            visible[best] = true;
        }
        let Some(first) = (0..n).find(|&i| visible[i] && !visible[(i + n - 1) % n]) else {
            return Err(SurfaceError::DegenerateGeometry);
        };
        let mut last = first;
        while visible[(last + 1) % n] && (last + 1) % n != first
        {
            last = (last + 1) % n;
        }

        let mut e = first;
        loop
        {
            triangles.push([hull[e], p, hull[(e + 1) % n]]);
            if e == last
            {
                break;
            }
            e = (e + 1) % n;
        }

        let mut next_hull = Vec::with_capacity(n + 1);
        let mut k = (last + 1) % n;
        loop
        {
            next_hull.push(hull[k]);
            if k == first
            {
                break;
            }
            k = (k + 1) % n;
        }
        next_hull.push(p);
        hull = next_hull;
    }
    Ok(triangles)
}

/// Map from directed edge `(a, b)` to the triangle holding it and the local
/// index of the vertex opposite that edge.
fn edge_map(triangles: &[[usize; 3]]) -> FxHashMap<(usize, usize), (usize, usize)>
{
    let mut map = FxHashMap::default();
    for (t, tri) in triangles.iter().enumerate()
    {
        for k in 0..3
        {
            map.insert((tri[(k + 1) % 3], tri[(k + 2) % 3]), (t, k));
        }
    }
    map
}

///
/// Lawson flips. Returns the number of flips performed.
///
fn legalize(unit: &[[f64; 2]], boxed: &[[f64; 2]], triangles: &mut [[usize; 3]]) -> usize
{
    let mut flips = 0;
    'restart: while flips < MAX_FLIPS
    {
        let map = edge_map(triangles);
        for t in 0..triangles.len()
        {
            for k in 0..3
            {
                let tri = triangles[t];
                let (c, a, b) = (tri[k], tri[(k + 1) % 3], tri[(k + 2) % 3]);
                let Some(&(u, ku)) = map.get(&(b, a)) else { continue; };
                let d = triangles[u][ku];
                if in_circle(unit[a], unit[b], unit[c], unit[d]) <= INCIRCLE_EPS
                {
                    continue;
                }
                // flip only when the quad a, d, b, c is strictly convex
                if orient(boxed[a], boxed[d], boxed[c]) <= ORIENT_EPS || orient(boxed[d], boxed[b], boxed[c]) <= ORIENT_EPS
                {
                    continue;
                }
                triangles[t] = [a, d, c];
                triangles[u] = [d, b, c];
                flips += 1;
                continue 'restart;
            }
        }
        break;
    }
    flips
}

fn build_neighbors(triangles: &[[usize; 3]]) -> Vec<[Option<usize>; 3]>
{
    let map = edge_map(triangles);
    triangles.iter().map(|tri|
    {
        let mut n = [None; 3];
        for (k, slot) in n.iter_mut().enumerate()
        {
            let (a, b) = (tri[(k + 1) % 3], tri[(k + 2) % 3]);
            *slot = map.get(&(b, a)).map(|&(u, _)| u);
        }
        n
    }).collect()
}

fn build_vertex_neighbors(num_points: usize, triangles: &[[usize; 3]]) -> Vec<Vec<usize>>
{
    let mut adjacency = vec![Vec::new(); num_points];
    for tri in triangles
    {
        for k in 0..3
        {
            let (a, b) = (tri[k], tri[(k + 1) % 3]);
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
    }
    for list in adjacency.iter_mut()
    {
        list.sort_unstable();
        list.dedup();
    }
    adjacency
}
