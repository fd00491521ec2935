use std::io::Stdout;

use chip8_emulator::constants::{SCREEN_HEIGHT, SCREEN_WIDTH};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use tui::backend::CrosstermBackend;
use tui::style::Color;
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::Terminal;

/// Renders the frame buffer on the alternate screen of the terminal.
///
/// Raw mode and the alternate screen are restored on drop, so the shell
/// comes back intact even when the program faults.
pub struct TermScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TermScreen {
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        crossterm::execute!(stdout, EnterAlternateScreen)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.clear()?;
        Ok(Self { terminal })
    }

    /// Draw the 64×32 buffer, one canvas point per lit pixel
    #[allow(clippy::cast_precision_loss)]
    pub fn draw(&mut self, pixels: &[u8]) -> anyhow::Result<()> {
        let coords: Vec<(f64, f64)> = pixels
            .iter()
            .enumerate()
            .filter(|(_, &pixel)| pixel == 1)
            .map(|(index, _)| {
                // Canvas y grows upward, the buffer grows downward
                let x = (index % SCREEN_WIDTH) as f64;
                let y = (index / SCREEN_WIDTH) as f64;
                (x, -y)
            })
            .collect();

        self.terminal.draw(|frame| {
            let canvas = Canvas::default()
                .block(Block::default().borders(Borders::ALL).title("CHIP-8"))
                .marker(Marker::Block)
                .x_bounds([0.0, (SCREEN_WIDTH - 1) as f64])
                .y_bounds([-((SCREEN_HEIGHT - 1) as f64), 0.0])
                .paint(|ctx| {
                    ctx.draw(&Points {
                        coords: &coords,
                        color: Color::White,
                    });
                });
            frame.render_widget(canvas, frame.size());
        })?;

        Ok(())
    }
}

impl Drop for TermScreen {
    fn drop(&mut self) {
        let _ = crossterm::execute!(std::io::stdout(), LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}
