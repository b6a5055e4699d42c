use serde::{Deserialize, Serialize};

/// Grid cell. The origin is the top-left corner; `x` grows rightwards and
/// `y` grows downwards.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan_distance(&self, other: Point) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn chebyshev_distance(&self, other: Point) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    pub fn distance_squared(&self, other: Point) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }

    pub fn step(&self, direction: Direction) -> Point {
        let (dx, dy) = direction.unit();
        Point::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

pub const ALL_DIRECTIONS: [Direction; 4] = [
    Direction::Up,
    Direction::Down,
    Direction::Left,
    Direction::Right,
];

impl Direction {
    /// Unit vector in grid coordinates (up is -y).
    pub fn unit(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    pub fn is_opposite(&self, other: Direction) -> bool {
        self.opposite() == other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    pub fn parse(value: &str) -> Option<Direction> {
        match value {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }
}

/// Map bounds: x in [0, width), y in [0, height).
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= 0 && point.x < self.width && point.y >= 0 && point.y < self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_axes_match_grid_orientation() {
        let origin = Point::new(5, 5);
        assert_eq!(origin.step(Direction::Up), Point::new(5, 4));
        assert_eq!(origin.step(Direction::Down), Point::new(5, 6));
        assert_eq!(origin.step(Direction::Left), Point::new(4, 5));
        assert_eq!(origin.step(Direction::Right), Point::new(6, 5));
    }

    #[test]
    fn opposite_pairs() {
        for dir in ALL_DIRECTIONS {
            assert!(dir.is_opposite(dir.opposite()));
            assert!(!dir.is_opposite(dir));
        }
    }

    #[test]
    fn distances() {
        let a = Point::new(1, 2);
        let b = Point::new(4, 6);
        assert_eq!(a.manhattan_distance(b), 7);
        assert_eq!(a.chebyshev_distance(b), 4);
        assert_eq!(a.distance_squared(b), 25);
    }

    #[test]
    fn bounds_are_half_open() {
        let bounds = Bounds::new(10, 10);
        assert!(bounds.contains(Point::new(0, 0)));
        assert!(bounds.contains(Point::new(9, 9)));
        assert!(!bounds.contains(Point::new(10, 9)));
        assert!(!bounds.contains(Point::new(9, 10)));
        assert!(!bounds.contains(Point::new(-1, 0)));
    }

    #[test]
    fn direction_json_strings() {
        let json = serde_json::to_string(&Direction::Up).unwrap();
        assert_eq!(json, "\"up\"");
        let parsed: Direction = serde_json::from_str("\"left\"").unwrap();
        assert_eq!(parsed, Direction::Left);
        assert_eq!(Direction::parse("none"), None);
    }
}
