//! Approach directions, the pairs they are grouped into, and maps keyed by either.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The side of the intersection a vehicle approaches from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    North,
    South,
    East,
    West,
}

/// One of the two orthogonal direction pairs that share a signal phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Pair {
    /// North-South.
    NS,
    /// West-East.
    WE,
}

/// Returned when a direction, pair or mode name is not recognised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseEnumError {
    /// The kind of value that was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub input: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {:?}", self.kind, self.input)
    }
}

impl std::error::Error for ParseEnumError {}

impl Direction {
    /// All directions, in map order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// The pair this direction belongs to.
    pub fn pair(self) -> Pair {
        match self {
            Direction::North | Direction::South => Pair::NS,
            Direction::East | Direction::West => Pair::WE,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl Pair {
    /// Both pairs, in map order.
    pub const ALL: [Pair; 2] = [Pair::NS, Pair::WE];

    /// The two directions served by this pair.
    pub fn directions(self) -> [Direction; 2] {
        match self {
            Pair::NS => [Direction::North, Direction::South],
            Pair::WE => [Direction::West, Direction::East],
        }
    }

    /// The pair that conflicts with this one.
    pub fn other(self) -> Pair {
        match self {
            Pair::NS => Pair::WE,
            Pair::WE => Pair::NS,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Direction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "north" | "n" => Ok(Direction::North),
            "south" | "s" => Ok(Direction::South),
            "east" | "e" => Ok(Direction::East),
            "west" | "w" => Ok(Direction::West),
            _ => Err(ParseEnumError {
                kind: "direction",
                input: s.to_owned(),
            }),
        }
    }
}

impl FromStr for Pair {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NS" | "SN" => Ok(Pair::NS),
            "WE" | "EW" => Ok(Pair::WE),
            _ => Err(ParseEnumError {
                kind: "pair",
                input: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Pair::NS => "NS",
            Pair::WE => "WE",
        })
    }
}

/// A value for each [Direction].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DirectionMap<T>([T; 4]);

impl<T> DirectionMap<T> {
    /// Builds a map by evaluating `f` for every direction.
    pub fn from_fn(mut f: impl FnMut(Direction) -> T) -> Self {
        Self(Direction::ALL.map(&mut f))
    }

    /// Iterates over the entries in [Direction::ALL] order.
    pub fn iter(&self) -> impl Iterator<Item = (Direction, &T)> {
        Direction::ALL.into_iter().zip(self.0.iter())
    }

    /// Iterates mutably over the entries in [Direction::ALL] order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Direction, &mut T)> {
        Direction::ALL.into_iter().zip(self.0.iter_mut())
    }

    /// Iterates over the values.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }
}

impl<T: Copy> DirectionMap<T> {
    /// A map with the same value for every direction.
    pub fn splat(value: T) -> Self {
        Self([value; 4])
    }
}

impl<T> Index<Direction> for DirectionMap<T> {
    type Output = T;

    fn index(&self, dir: Direction) -> &T {
        &self.0[dir.index()]
    }
}

impl<T> IndexMut<Direction> for DirectionMap<T> {
    fn index_mut(&mut self, dir: Direction) -> &mut T {
        &mut self.0[dir.index()]
    }
}

/// A value for each [Pair].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PairMap<T>([T; 2]);

impl<T> PairMap<T> {
    /// Builds a map by evaluating `f` for both pairs.
    pub fn from_fn(mut f: impl FnMut(Pair) -> T) -> Self {
        Self(Pair::ALL.map(&mut f))
    }

    /// Iterates over the entries in [Pair::ALL] order.
    pub fn iter(&self) -> impl Iterator<Item = (Pair, &T)> {
        Pair::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T> Index<Pair> for PairMap<T> {
    type Output = T;

    fn index(&self, pair: Pair) -> &T {
        &self.0[pair.index()]
    }
}

impl<T> IndexMut<Pair> for PairMap<T> {
    fn index_mut(&mut self, pair: Pair) -> &mut T {
        &mut self.0[pair.index()]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pairs_partition_directions() {
        for pair in Pair::ALL {
            for dir in pair.directions() {
                assert_eq!(dir.pair(), pair);
            }
            assert_ne!(pair.other(), pair);
            assert_eq!(pair.other().other(), pair);
        }
    }

    #[test]
    fn parse_names() {
        assert_eq!("north".parse::<Direction>(), Ok(Direction::North));
        assert_eq!("We".parse::<Pair>(), Ok(Pair::WE));
        let err = "diagonal".parse::<Pair>().unwrap_err();
        assert_eq!(err.kind, "pair");
        assert_eq!(err.to_string(), "unknown pair: \"diagonal\"");
    }

    #[test]
    fn map_indexing() {
        let mut map = DirectionMap::splat(0u32);
        map[Direction::East] = 3;
        assert_eq!(map[Direction::East], 3);
        assert_eq!(map.values().sum::<u32>(), 3);
        let pairs = PairMap::from_fn(|p| p.directions().map(|d| map[d]).iter().sum::<u32>());
        assert_eq!(pairs[Pair::WE], 3);
        assert_eq!(pairs[Pair::NS], 0);
    }
}
