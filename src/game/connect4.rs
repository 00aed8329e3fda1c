//! Connect Four board, turn order and win detection.

use std::fmt;

use serde::{Serialize, Serializer};

/// Number of columns on the board.
pub const COLUMNS: usize = 7;

/// Number of rows on the board. Row `0` is the bottom.
pub const ROWS: usize = 6;

/// Discs in a line needed to win.
const WIN_LENGTH: usize = 4;

/// Line directions checked for a win: horizontal, vertical, both diagonals.
const DIRECTIONS: [(isize, isize); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

/// One of the two participants in a game.
///
/// Serialized on the wire as the integer `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Player {
    /// The player who starts the game and moves first.
    One,
    /// The player who moves second.
    Two,
}

impl Player {
    /// Returns the wire number of this player (`1` or `2`).
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    /// Returns the opposing player.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl Serialize for Player {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.number())
    }
}

/// A disc dropped by `player` into `column`, landing on `row`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Move {
    /// Who played.
    pub player: Player,
    /// Column the disc was dropped into.
    pub column: usize,
    /// Row the disc came to rest on.
    pub row: usize,
}

/// Reasons a move is rejected. The display text is sent verbatim to the
/// offending client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// A winner has already been decided.
    #[error("Game is over.")]
    GameOver,

    /// The column is outside the board.
    #[error("Invalid column.")]
    InvalidColumn,

    /// The player moved out of turn.
    #[error("It isn't your turn.")]
    WrongTurn,

    /// The column already holds [`ROWS`] discs.
    #[error("This slot is full.")]
    ColumnFull,
}

/// State of one Connect Four game.
///
/// The move log is append-only and the winner is set at most once; a
/// rejected move leaves both untouched.
#[derive(Debug, Clone, Default)]
pub struct Connect4 {
    moves: Vec<Move>,
    heights: [usize; COLUMNS],
    winner: Option<Player>,
}

impl Connect4 {
    /// Creates an empty board with player one to move.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the row a disc for `player` would land on in `column`,
    /// without playing it.
    ///
    /// # Errors
    ///
    /// Returns the [`GameError`] that [`Connect4::play`] would return.
    pub fn check(&self, player: Player, column: usize) -> Result<usize, GameError> {
        if self.winner.is_some() {
            return Err(GameError::GameOver);
        }
        let row = *self
            .heights
            .get(column)
            .ok_or(GameError::InvalidColumn)?;
        if player != self.next_player() {
            return Err(GameError::WrongTurn);
        }
        if row >= ROWS {
            return Err(GameError::ColumnFull);
        }
        Ok(row)
    }

    /// Drops a disc for `player` into `column` and returns the row it lands on.
    ///
    /// # Errors
    ///
    /// Returns a [`GameError`] when the game is over, the column is off the
    /// board, it is not `player`'s turn, or the column is full.
    pub fn play(&mut self, player: Player, column: usize) -> Result<usize, GameError> {
        let row = self.check(player, column)?;
        if let Some(height) = self.heights.get_mut(column) {
            *height = row + 1;
        }
        self.moves.push(Move {
            player,
            column,
            row,
        });

        if self.completes_line(player, column, row) {
            self.winner = Some(player);
        }
        Ok(row)
    }

    /// Returns the winner, if the game has been decided.
    #[must_use]
    pub const fn winner(&self) -> Option<Player> {
        self.winner
    }

    /// Returns the player expected to move next.
    #[must_use]
    pub fn next_player(&self) -> Player {
        self.moves
            .last()
            .map_or(Player::One, |last| last.player.other())
    }

    /// Returns every move played so far, in order.
    #[must_use]
    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    /// Returns an owned copy of the move log.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Move> {
        self.moves.clone()
    }

    /// Returns the disc at `(column, row)`, or `None` for an empty or
    /// off-board cell.
    #[must_use]
    pub fn cell(&self, column: usize, row: usize) -> Option<Player> {
        self.moves
            .iter()
            .find(|m| m.column == column && m.row == row)
            .map(|m| m.player)
    }

    fn completes_line(&self, player: Player, column: usize, row: usize) -> bool {
        DIRECTIONS.iter().any(|&(dc, dr)| {
            let forward = self.run_length(player, column, row, dc, dr);
            let backward = self.run_length(player, column, row, -dc, -dr);
            forward + backward + 1 >= WIN_LENGTH
        })
    }

    /// Counts consecutive discs of `player` starting next to `(column, row)`
    /// and stepping by `(dc, dr)`.
    fn run_length(&self, player: Player, column: usize, row: usize, dc: isize, dr: isize) -> usize {
        let mut count = 0;
        let (mut c, mut r) = (column, row);
        while count < WIN_LENGTH {
            let (Some(nc), Some(nr)) = (c.checked_add_signed(dc), r.checked_add_signed(dr)) else {
                break;
            };
            if nc >= COLUMNS || nr >= ROWS || self.cell(nc, nr) != Some(player) {
                break;
            }
            count += 1;
            c = nc;
            r = nr;
        }
        count
    }
}
