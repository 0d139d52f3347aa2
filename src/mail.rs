//! OTP email delivery over SMTP.
//!
//! One transport is built per configured sender account; each send
//! draws one account at random, which spreads volume across the pool
//! when more than one is configured.

use anyhow::{anyhow, Context};
use chrono::Datelike;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use rand::Rng;

use crate::{conf::ConfSmtp, otp::Otp};

#[derive(Clone)]
pub struct Mailer {
    pool: Vec<Sender>,
}

#[derive(Clone)]
struct Sender {
    address: String,
    transport: Transport,
}

#[derive(Clone)]
enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    #[cfg(test)]
    Stub(lettre::transport::stub::AsyncStubTransport),
}

impl Mailer {
    pub fn new(conf: &ConfSmtp) -> anyhow::Result<Self> {
        if conf.accounts.is_empty() {
            return Err(anyhow!("No SMTP sender accounts configured"));
        }
        let mut pool = Vec::with_capacity(conf.accounts.len());
        for account in &conf.accounts {
            let transport =
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(
                    &conf.host,
                )
                .context(format!(
                    "Failed to build SMTP transport for host {:?}",
                    conf.host
                ))?
                .port(conf.port)
                .credentials(Credentials::new(
                    account.user.clone(),
                    account.pass.clone(),
                ))
                .build();
            pool.push(Sender {
                address: account.user.clone(),
                transport: Transport::Smtp(transport),
            });
        }
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub fn stub(addresses: &[&str]) -> Self {
        let pool = addresses
            .iter()
            .map(|address| Sender {
                address: (*address).to_string(),
                transport: Transport::Stub(
                    lettre::transport::stub::AsyncStubTransport::new_ok(),
                ),
            })
            .collect();
        Self { pool }
    }

    /// Emails the given OTP, drawing one sender account from the pool.
    pub async fn send_otp(
        &self,
        to: &str,
        username: &str,
        otp: &Otp,
    ) -> anyhow::Result<()> {
        let sender = self.pick();
        tracing::info!(from = %sender.address, "Sending OTP email.");
        let message = otp_message(&sender.address, to, username, otp)?;
        match &sender.transport {
            Transport::Smtp(transport) => {
                transport
                    .send(message)
                    .await
                    .context("SMTP send failed")?;
            }
            #[cfg(test)]
            Transport::Stub(transport) => {
                transport
                    .send(message)
                    .await
                    .context("Stub send failed")?;
            }
        }
        Ok(())
    }

    fn pick(&self) -> &Sender {
        let index = rand::thread_rng().gen_range(0..self.pool.len());
        &self.pool[index]
    }
}

pub fn otp_message(
    from: &str,
    to: &str,
    username: &str,
    otp: &Otp,
) -> anyhow::Result<Message> {
    let message = Message::builder()
        .from(
            format!("\"LyxeNime Security\" <{from}>")
                .parse()
                .context(format!("Bad sender address: {from:?}"))?,
        )
        .to(to
            .parse()
            .context(format!("Bad recipient address: {to:?}"))?)
        .subject(format!("{otp} - Your LyxeNime verification code"))
        .header(ContentType::TEXT_HTML)
        .body(otp_email_html(username, otp))?;
    Ok(message)
}

fn otp_email_html(username: &str, otp: &Otp) -> String {
    let year = chrono::Utc::now().year();
    format!(
        r##"<!DOCTYPE html>
<html>
<head>
<style>
    body {{ margin: 0; padding: 0; font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; background-color: #000000; }}
    .container {{ max-width: 600px; margin: 20px auto 0; background-color: #0a0a0a; border: 1px solid #333; border-radius: 16px; overflow: hidden; box-shadow: 0 4px 15px rgba(229, 9, 20, 0.2); }}
    .header {{ background-color: #111; padding: 20px; text-align: center; border-bottom: 2px solid #E50914; }}
    .logo {{ font-size: 24px; font-weight: 900; color: #fff; letter-spacing: -1px; text-decoration: none; font-style: italic; }}
    .logo span {{ color: #E50914; }}
    .content {{ padding: 40px 30px; text-align: center; color: #cccccc; }}
    .otp-box {{ background-color: #1a1a1a; border: 2px dashed #333; color: #E50914; font-size: 36px; font-weight: bold; letter-spacing: 8px; padding: 20px; margin: 30px 0; border-radius: 12px; display: inline-block; }}
    .footer {{ background-color: #111; padding: 20px; text-align: center; color: #555; font-size: 12px; border-top: 1px solid #333; }}
    .warning {{ color: #666; font-size: 13px; margin-top: 20px; line-height: 1.5; }}
</style>
</head>
<body>
<div class="container">
    <div class="header">
        <a href="#" class="logo">LYXE<span>NIME</span></a>
    </div>
    <div class="content">
        <h2 style="color: #fff; margin-top: 0;">Account Verification</h2>
        <p>Hi <strong>{username}</strong>,</p>
        <p>Thanks for joining! Use the code below to finish setting up your LyxeNime account.</p>
        <div class="otp-box">{otp}</div>
        <p style="color: #fff; font-weight: bold;">This code expires in 15 minutes.</p>
        <div class="warning">
            <p>Never share this code with anyone, including people claiming to be LyxeNime staff.</p>
        </div>
    </div>
    <div class="footer">
        &copy; {year} LyxeNime Project. All rights reserved.
    </div>
</div>
</body>
</html>
"##
    )
}
