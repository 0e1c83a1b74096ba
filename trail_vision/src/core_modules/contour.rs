// THEORY:
// Contour extraction turns the binary mask into one closed boundary polygon per
// outermost connected foreground region.
//
// Algorithm steps:
// 1.  **Exterior Flood**: Background pixels that can reach the outside of the image
//     through 4-connected background are marked as "exterior". Everything else that
//     is background is a hole (or a pocket enclosed by foreground).
// 2.  **Component Scan**: The mask is scanned in raster order. The first unvisited
//     foreground pixel met starts a new 8-connected component, which is flooded and
//     marked visited. The component is "external" when any of its pixels is
//     4-adjacent to the exterior (or to the image edge). Components sitting inside
//     the hole of another component are skipped, and holes never produce contours.
// 3.  **Border Following**: The outer border of an external component is traced
//     from its first raster pixel using the classic Suzuki–Abe neighbourhood walk:
//     counter-clockwise search around the current pixel, starting just after the
//     pixel we arrived from. The walk stops when it is about to repeat its first step.
// 4.  **Chain Approximation**: Points in the middle of straight horizontal, vertical
//     or diagonal runs are dropped, leaving only the points where the direction
//     changes. The enclosed polygon (and therefore area and moments) is unchanged.
//
// Contours are produced fresh every frame and are not persisted.

use crate::core_modules::frame::Mask;
use std::collections::VecDeque;

/// An integer pixel coordinate on a contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    fn step(self, direction: usize) -> Self {
        let (dx, dy) = DIRECTIONS[direction];
        Self::new(self.x + dx, self.y + dy)
    }
}

/// A closed boundary. The last point connects back to the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<Point>,
}

impl Contour {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Eight neighbours in counter-clockwise order on screen (y grows downwards),
/// starting east.
const DIRECTIONS: [(i32, i32); 8] = [(1, 0), (1, -1), (0, -1), (-1, -1), (-1, 0), (-1, 1), (0, 1), (1, 1)];
const WEST: usize = 4;

fn direction_between(from: Point, to: Point) -> Option<usize> {
    let delta = (to.x - from.x, to.y - from.y);
    DIRECTIONS.iter().position(|&d| d == delta)
}

/// Finds the outer boundary of every external foreground region, in discovery
/// (raster) order, with straight runs compressed.
pub fn find_external_contours(mask: &Mask) -> Vec<Contour> {
    let (width, height) = (mask.width() as usize, mask.height() as usize);
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let exterior = exterior_background(mask);
    let mut visited = vec![false; width * height];
    let mut contours = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            if visited[idx] || !mask.is_foreground(x as u32, y as u32) {
                continue;
            }
            let external = flood_component(mask, &exterior, &mut visited, x, y);
            if external {
                let border = trace_outer_border(mask, Point::new(x as i32, y as i32));
                contours.push(Contour {
                    points: approximate_simple(&border),
                });
            }
        }
    }
    contours
}

/// Marks background pixels 4-connected to the image boundary.
fn exterior_background(mask: &Mask) -> Vec<bool> {
    let (width, height) = (mask.width() as usize, mask.height() as usize);
    let mut exterior = vec![false; width * height];
    let mut queue = VecDeque::new();

    let seed = |x: usize, y: usize, exterior: &mut Vec<bool>, queue: &mut VecDeque<(usize, usize)>| {
        let idx = y * width + x;
        if !exterior[idx] && !mask.is_foreground(x as u32, y as u32) {
            exterior[idx] = true;
            queue.push_back((x, y));
        }
    };
    for x in 0..width {
        seed(x, 0, &mut exterior, &mut queue);
        seed(x, height - 1, &mut exterior, &mut queue);
    }
    for y in 0..height {
        seed(0, y, &mut exterior, &mut queue);
        seed(width - 1, y, &mut exterior, &mut queue);
    }

    while let Some((x, y)) = queue.pop_front() {
        let neighbours = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbours {
            if nx >= width || ny >= height {
                continue;
            }
            let idx = ny * width + nx;
            if !exterior[idx] && !mask.is_foreground(nx as u32, ny as u32) {
                exterior[idx] = true;
                queue.push_back((nx, ny));
            }
        }
    }
    exterior
}

/// Floods the 8-connected component containing `(x0, y0)`, marking it visited.
/// Returns whether the component touches the exterior background or the image edge.
fn flood_component(mask: &Mask, exterior: &[bool], visited: &mut [bool], x0: usize, y0: usize) -> bool {
    let (width, height) = (mask.width() as i64, mask.height() as i64);
    let mut touches_exterior = false;
    let mut stack = vec![(x0 as i64, y0 as i64)];
    visited[y0 * width as usize + x0] = true;

    while let Some((x, y)) = stack.pop() {
        if !touches_exterior {
            touches_exterior = [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
                .iter()
                .any(|&(nx, ny)| {
                    nx < 0 || ny < 0 || nx >= width || ny >= height || exterior[(ny * width + nx) as usize]
                });
        }
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= width || ny >= height {
                    continue;
                }
                let idx = (ny * width + nx) as usize;
                if !visited[idx] && mask.is_foreground(nx as u32, ny as u32) {
                    visited[idx] = true;
                    stack.push((nx, ny));
                }
            }
        }
    }
    touches_exterior
}

/// Follows the outer border starting at `start`, whose west neighbour is background.
fn trace_outer_border(mask: &Mask, start: Point) -> Vec<Point> {
    let is_fg = |p: Point| mask.is_foreground_signed(p.x, p.y);

    // Clockwise search from the west neighbour for the first foreground neighbour.
    let first = (0..8)
        .map(|k| (WEST + 8 - k) % 8)
        .map(|d| start.step(d))
        .find(|&p| is_fg(p));
    let Some(second) = first else {
        return vec![start];
    };

    let mut points = Vec::new();
    let mut previous = second;
    let mut current = start;
    loop {
        let back = direction_between(current, previous).unwrap_or(WEST);
        // Counter-clockwise search starting just after the pixel we came from. The
        // previous pixel is foreground, so the search always succeeds by k = 8.
        let next = (1..=8)
            .map(|k| current.step((back + k) % 8))
            .find(|&p| is_fg(p))
            .unwrap_or(previous);

        points.push(current);
        if next == start && current == second {
            break;
        }
        previous = current;
        current = next;
    }
    points
}

/// Keeps only the points where the chain changes direction.
pub fn approximate_simple(points: &[Point]) -> Vec<Point> {
    let n = points.len();
    if n <= 2 {
        return points.to_vec();
    }
    let delta = |a: Point, b: Point| (b.x - a.x, b.y - a.y);
    let kept: Vec<Point> = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            delta(prev, points[i]) != delta(points[i], next)
        })
        .map(|i| points[i])
        .collect();
    if kept.is_empty() {
        // A chain with no turns at all only happens for a degenerate loop; keep its ends.
        return vec![points[0], points[n - 1]];
    }
    kept
}
