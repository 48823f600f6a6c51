use rand::Rng;
use server::transport::{framed, MessageSink, MessageStream};
use shared::protocol::{
    MSG_DISCONNECTED, MSG_LOGIN, MSG_MOVE_APPROVED, MSG_MOVE_REQUEST, MSG_POSITION_CORRECTION,
};
use shared::{Disconnected, Envelope, Login, MoveRequest, PositionCorrection, Vec3};
use tokio::net::TcpStream;

// Simple headless client used to exercise a running server: logs in, asks to
// move to random targets, and prints the correction stream.

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:9160".to_string());
    let rounds: u32 = std::env::args()
        .nth(2)
        .map(|raw| raw.parse())
        .transpose()?
        .unwrap_or(3);

    println!("connecting to {}", address);
    let socket = TcpStream::connect(&address).await?;
    let (mut stream, mut sink) = framed(socket);

    let client_id = rand::thread_rng().gen_range(1..1_000_000);
    let login = Login {
        client_id,
        username: format!("tester-{}", client_id),
    };
    sink.send(Envelope::encode(MSG_LOGIN, &login)?).await?;
    println!("logged in as {} (client {})", login.username, client_id);

    for round in 0..rounds {
        let target = random_target();
        println!(
            "round {}: requesting move to ({:.1}, {:.1}, {:.1})",
            round, target.x, target.y, target.z
        );
        sink.send(Envelope::encode(MSG_MOVE_REQUEST, &MoveRequest { target })?)
            .await?;

        loop {
            let envelope = stream.recv().await?;
            match envelope.msg_type.as_str() {
                MSG_MOVE_APPROVED => {
                    println!("  move approved");
                }
                MSG_POSITION_CORRECTION => {
                    let correction: PositionCorrection = envelope.decode()?;
                    let position = correction.position;
                    println!(
                        "  corrected to ({:.3}, {:.3}, {:.3})",
                        position.x, position.y, position.z
                    );
                    if position == target {
                        println!("  arrived");
                        break;
                    }
                }
                MSG_DISCONNECTED => {
                    let notice: Disconnected = envelope.decode()?;
                    println!("server disconnected us: {}", notice.reason);
                    return Ok(());
                }
                other => {
                    println!("  ignoring message type {:?}", other);
                }
            }
        }
    }

    println!("done");
    Ok(())
}

fn random_target() -> Vec3 {
    let mut rng = rand::thread_rng();
    Vec3::new(
        rng.gen_range(-5.0..5.0),
        rng.gen_range(-5.0..5.0),
        rng.gen_range(-5.0..5.0),
    )
}
