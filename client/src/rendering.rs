use crate::board::BoardReplica;
use crate::roster::RosterReplica;
use crate::session::{format_clock, ClientStatus, GameClient};
use macroquad::prelude::*;
use shared::Cell;

const SIDEBAR_WIDTH: f32 = 220.0;
const STATUS_HEIGHT: f32 = 32.0;
const MARGIN: f32 = 10.0;
const MIN_CELL_SIZE: f32 = 4.0;
const SCOREBOARD_ROWS: usize = 20;

/// Where the board sits on screen. Pure geometry so hit-testing can be checked
/// without a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardLayout {
    pub origin_x: f32,
    pub origin_y: f32,
    pub cell_size: f32,
    pub columns: usize,
    pub rows: usize,
}

impl BoardLayout {
    /// Largest square cells that fit `columns` x `rows` into the given area.
    pub fn fit(columns: usize, rows: usize, x: f32, y: f32, width: f32, height: f32) -> Self {
        let cell_size = if columns == 0 || rows == 0 {
            MIN_CELL_SIZE
        } else {
            (width / columns as f32)
                .min(height / rows as f32)
                .floor()
                .max(MIN_CELL_SIZE)
        };
        Self {
            origin_x: x,
            origin_y: y,
            cell_size,
            columns,
            rows,
        }
    }

    /// Board coordinate under a screen position, if any.
    pub fn cell_at(&self, px: f32, py: f32) -> Option<(u32, u32)> {
        let dx = px - self.origin_x;
        let dy = py - self.origin_y;
        if dx < 0.0 || dy < 0.0 {
            return None;
        }

        let x = (dx / self.cell_size) as usize;
        let y = (dy / self.cell_size) as usize;
        if x >= self.columns || y >= self.rows {
            return None;
        }
        Some((u32::try_from(x).ok()?, u32::try_from(y).ok()?))
    }

    /// Top-left corner of a cell.
    pub fn cell_origin(&self, x: usize, y: usize) -> (f32, f32) {
        (
            self.origin_x + x as f32 * self.cell_size,
            self.origin_y + y as f32 * self.cell_size,
        )
    }
}

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    /// Board placement for the current window size.
    pub fn layout(&self, board: &BoardReplica) -> BoardLayout {
        BoardLayout::fit(
            board.width(),
            board.height(),
            MARGIN,
            STATUS_HEIGHT + MARGIN,
            (self.width - SIDEBAR_WIDTH - 2.0 * MARGIN).max(0.0),
            (self.height - STATUS_HEIGHT - 2.0 * MARGIN).max(0.0),
        )
    }

    pub fn render(&mut self, client: &GameClient, now: i64) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        if let Some(board) = client.board() {
            self.draw_board(board);
        }
        self.draw_scoreboard(client.roster());
        self.draw_status_bar(client, now);

        match client.status() {
            ClientStatus::Connecting => {
                let attempts = client.reconnect_attempts();
                let message = if attempts == 0 {
                    "Connecting...".to_string()
                } else {
                    format!("Connection lost, retrying (attempt {})", attempts)
                };
                self.draw_banner(&message);
            }
            ClientStatus::WaitingForBoard => self.draw_banner("Waiting for game board..."),
            ClientStatus::Ended => {
                let message = match client.restart_in(now) {
                    Some(secs) => format!("Game over - next round in {}", format_clock(secs)),
                    None => "Game over".to_string(),
                };
                self.draw_banner(&message);
            }
            ClientStatus::InProgress => {}
        }
    }

    fn draw_board(&mut self, board: &BoardReplica) {
        let layout = self.layout(board);
        for ((x, y), cell) in board.cells().indexed_iter() {
            self.draw_cell(&layout, x, y, cell);
        }
    }

    fn draw_cell(&mut self, layout: &BoardLayout, x: usize, y: usize, cell: &Cell) {
        let (cx, cy) = layout.cell_origin(x, y);
        let size = layout.cell_size;

        let fill = match (cell.revealed, cell.mine) {
            (true, true) => Color::from_rgba(200, 40, 40, 255),
            (true, false) => Color::from_rgba(68, 68, 68, 255),
            (false, _) => Color::from_rgba(120, 120, 120, 255),
        };
        draw_rectangle(cx, cy, size, size, fill);
        draw_rectangle_lines(cx, cy, size, size, 1.0, Color::from_rgba(26, 26, 26, 255));

        if size < 10.0 {
            return;
        }

        if cell.is_flagged() && !cell.revealed {
            let color = cell.flag_owner.as_deref().map_or(WHITE, owner_color);
            draw_triangle(
                vec2(cx + size * 0.3, cy + size * 0.2),
                vec2(cx + size * 0.3, cy + size * 0.6),
                vec2(cx + size * 0.8, cy + size * 0.4),
                color,
            );
            draw_line(
                cx + size * 0.3,
                cy + size * 0.2,
                cx + size * 0.3,
                cy + size * 0.85,
                1.0,
                WHITE,
            );
        } else if cell.revealed && cell.mine {
            draw_circle(cx + size / 2.0, cy + size / 2.0, size * 0.3, BLACK);
        } else if cell.shows_count() {
            let text = cell.adjacent_mines.to_string();
            let font_size = size * 0.8;
            let dims = measure_text(&text, None, font_size as u16, 1.0);
            draw_text(
                &text,
                cx + (size - dims.width) / 2.0,
                cy + (size + dims.offset_y) / 2.0,
                font_size,
                count_color(cell.adjacent_mines),
            );
        }
    }

    fn draw_scoreboard(&mut self, roster: &RosterReplica) {
        let x = self.width - SIDEBAR_WIDTH + MARGIN;
        let mut y = STATUS_HEIGHT + MARGIN + 16.0;

        draw_text(
            &format!("Players ({})", roster.len()),
            x,
            y,
            20.0,
            WHITE,
        );
        y += 8.0;

        for (rank, player) in roster.ranked().into_iter().take(SCOREBOARD_ROWS).enumerate() {
            y += 20.0;
            draw_rectangle(x, y - 10.0, 10.0, 10.0, owner_color(&player.id));

            let name = if player.display_name.is_empty() {
                player.id.as_str()
            } else {
                player.display_name.as_str()
            };
            let line = format!("{:>2}. {:<14.14} {:>5}", rank + 1, name, player.score);
            draw_text(&line, x + 16.0, y, 16.0, WHITE);
        }
    }

    fn draw_status_bar(&mut self, client: &GameClient, now: i64) {
        draw_rectangle(0.0, 0.0, self.width, STATUS_HEIGHT, Color::from_rgba(40, 40, 40, 255));

        let connection_color = match client.status() {
            ClientStatus::Connecting => RED,
            ClientStatus::WaitingForBoard => YELLOW,
            ClientStatus::InProgress | ClientStatus::Ended => GREEN,
        };
        draw_rectangle(MARGIN, 12.0, 8.0, 8.0, connection_color);

        let mut text = String::from("CON");
        if let Some(board) = client.board() {
            text.push_str(&format!("   Cells left: {}", board.cells_remaining()));
        }
        if let Some(elapsed) = client.elapsed_secs(now) {
            text.push_str(&format!("   Time: {}", format_clock(elapsed)));
        }
        draw_text(&text, MARGIN + 14.0, 21.0, 18.0, WHITE);
    }

    fn draw_banner(&mut self, message: &str) {
        let font_size = 28.0;
        let dims = measure_text(message, None, font_size as u16, 1.0);
        let x = (self.width - dims.width) / 2.0;
        let y = self.height / 2.0;

        draw_rectangle(
            x - MARGIN,
            y - dims.offset_y - MARGIN,
            dims.width + 2.0 * MARGIN,
            dims.height + 2.0 * MARGIN,
            Color::from_rgba(0, 0, 0, 200),
        );
        draw_text(message, x, y, font_size, WHITE);
    }
}

/// Stable per-player color so flags and scoreboard rows match.
fn owner_color(id: &str) -> Color {
    let hash = id.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    match hash % 8 {
        0 => WHITE,
        1 => RED,
        2 => GREEN,
        3 => BLUE,
        4 => YELLOW,
        5 => MAGENTA,
        6 => Color::from_rgba(0, 255, 255, 255),
        _ => Color::from_rgba(255, 136, 0, 255),
    }
}

fn count_color(count: u32) -> Color {
    match count {
        1 => Color::from_rgba(80, 160, 255, 255),
        2 => Color::from_rgba(80, 200, 80, 255),
        3 => Color::from_rgba(255, 80, 80, 255),
        4 => Color::from_rgba(160, 80, 255, 255),
        5 => Color::from_rgba(200, 120, 40, 255),
        _ => Color::from_rgba(0, 220, 220, 255),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_uses_smaller_dimension() {
        let layout = BoardLayout::fit(10, 5, 0.0, 0.0, 400.0, 100.0);
        assert_eq!(layout.cell_size, 20.0);

        let layout = BoardLayout::fit(3, 3, 0.0, 0.0, 100.0, 100.0);
        assert_eq!(layout.cell_size, 33.0);
    }

    #[test]
    fn test_fit_has_minimum_cell_size() {
        let layout = BoardLayout::fit(1000, 1000, 0.0, 0.0, 200.0, 200.0);
        assert_eq!(layout.cell_size, MIN_CELL_SIZE);
    }

    #[test]
    fn test_cell_at() {
        let layout = BoardLayout::fit(4, 3, 10.0, 40.0, 80.0, 60.0);
        assert_eq!(layout.cell_size, 20.0);

        assert_eq!(layout.cell_at(10.0, 40.0), Some((0, 0)));
        assert_eq!(layout.cell_at(29.9, 59.9), Some((0, 0)));
        assert_eq!(layout.cell_at(30.0, 60.0), Some((1, 1)));
        assert_eq!(layout.cell_at(89.0, 99.0), Some((3, 2)));
    }

    #[test]
    fn test_cell_at_outside_board() {
        let layout = BoardLayout::fit(4, 3, 10.0, 40.0, 80.0, 60.0);

        assert_eq!(layout.cell_at(5.0, 50.0), None);
        assert_eq!(layout.cell_at(20.0, 39.0), None);
        assert_eq!(layout.cell_at(90.0, 50.0), None);
        assert_eq!(layout.cell_at(20.0, 100.0), None);
    }

    #[test]
    fn test_cell_origin_round_trips_through_cell_at() {
        let layout = BoardLayout::fit(8, 8, 12.0, 50.0, 320.0, 320.0);
        let (x, y) = layout.cell_origin(5, 2);
        assert_eq!(layout.cell_at(x + 1.0, y + 1.0), Some((5, 2)));
    }

    #[test]
    fn test_owner_color_is_stable() {
        assert_eq!(owner_color("p1"), owner_color("p1"));
    }
}
