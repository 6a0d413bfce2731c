use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use super::commands::{find_url, mentions, Command};
use super::delivery::TelegramDelivery;
use super::keyboards::{self, CallbackAction, MenuButton};
use super::status::StatusMessage;
use super::Bot;
use crate::constants::{DONATE_AMOUNT_STARS, DONATE_PAYLOAD, STARS_CURRENCY};
use crate::db::{self, DefaultQuality, EffectiveSettings, UserProfile};
use crate::dispatcher::{ProcessError, Request};
use crate::extractors::FormatChoice;
use crate::locales::{describe_error, t, tf, Language, Msg};
use crate::progress::ProgressReporter;
use crate::telegram::types::{
    CallbackQuery, Chat, InlineQuery, InlineQueryResultArticle, LabeledPrice, Message,
    PreCheckoutQuery, ReplyMarkup, Update, User,
};

impl Bot {
    /// Handle one update. Failures are logged, never propagated.
    pub async fn handle_update(&self, update: Update) {
        let update_id = update.update_id;
        let result = if let Some(message) = update.message {
            self.handle_message(message).await
        } else if let Some(query) = update.callback_query {
            self.handle_callback(query).await
        } else if let Some(query) = update.inline_query {
            self.handle_inline_query(query).await
        } else if let Some(query) = update.pre_checkout_query {
            self.handle_pre_checkout(query).await
        } else {
            debug!(update_id, "Ignoring update without a handled payload");
            Ok(())
        };

        if let Err(e) = result {
            error!(update_id, "Failed to handle update: {e:#}");
        }
    }

    // ========== Messages ==========

    async fn handle_message(&self, message: Message) -> Result<()> {
        let Some(user) = message.from.as_ref() else {
            return Ok(());
        };
        if user.is_bot {
            return Ok(());
        }
        let chat_id = message.chat.id;

        self.record_profile(user).await;
        let settings = db::effective_settings(self.db.pool(), user.id, chat_id).await?;
        let lang = settings.language;

        if let Some(payment) = &message.successful_payment {
            info!(
                user_id = user.id,
                amount = payment.total_amount,
                currency = %payment.currency,
                payload = %payment.invoice_payload,
                "Received donation"
            );
            return self.reply(chat_id, &t(lang, Msg::PaymentThanks)).await;
        }

        if let Some(contact) = &message.contact {
            // Only a user's own shared contact is recorded
            if contact.user_id == Some(user.id) {
                db::update_user_phone(self.db.pool(), user.id, &contact.phone_number).await?;
                debug!(user_id = user.id, "Recorded phone number");
            }
            return Ok(());
        }

        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };

        if let Some(command) = Command::parse(text, &self.username) {
            return self.handle_command(command, user, &message.chat, &settings).await;
        }

        if message.chat.is_private() {
            match MenuButton::from_label(lang, text) {
                Some(MenuButton::Settings) => self.send_settings(chat_id, &settings).await,
                Some(MenuButton::Help) => self.reply(chat_id, &t(lang, Msg::Help)).await,
                Some(MenuButton::Donate) => self.send_donation_invoice(chat_id, lang).await,
                None => self.handle_url(text.trim(), user.id, chat_id, &settings).await,
            }
        } else if mentions(text, &self.username) {
            match find_url(text) {
                Some(url) => self.handle_url(url, user.id, chat_id, &settings).await,
                None => Ok(()),
            }
        } else {
            Ok(())
        }
    }

    async fn handle_command(
        &self,
        command: Command,
        user: &User,
        chat: &Chat,
        settings: &EffectiveSettings,
    ) -> Result<()> {
        let lang = settings.language;
        debug!(user_id = user.id, chat_id = chat.id, command = ?command, "Command");

        match command {
            Command::Start if chat.is_private() => {
                self.api
                    .send_message(
                        chat.id,
                        &t(lang, Msg::Welcome),
                        Some(&keyboards::main_keyboard(lang)),
                    )
                    .await
                    .context("Failed to send welcome")?;
                Ok(())
            }
            Command::Start => self.reply(chat.id, &t(lang, Msg::GroupWelcome)).await,
            Command::Help => self.reply(chat.id, &t(lang, Msg::Help)).await,
            Command::Settings => self.send_settings(chat.id, settings).await,
            Command::Donate => self.send_donation_invoice(chat.id, lang).await,
            Command::PaySupport => self.reply(chat.id, &t(lang, Msg::PaymentSupport)).await,
            Command::Zen(None) => self.reply(chat.id, &t(lang, Msg::MissingUrl)).await,
            Command::Zen(Some(url)) => self.handle_url(&url, user.id, chat.id, settings).await,
        }
    }

    /// Start handling a URL: list formats, then ask or download.
    async fn handle_url(
        &self,
        url: &str,
        user_id: i64,
        chat_id: i64,
        settings: &EffectiveSettings,
    ) -> Result<()> {
        let lang = settings.language;

        if self.dispatcher.classify(url).is_none() {
            return self.reply(chat_id, &t(lang, Msg::UnsupportedUrl)).await;
        }
        if !self.limiter.check(user_id) {
            debug!(user_id, "Request quota exhausted");
            return self.reply(chat_id, &t(lang, Msg::SlowDown)).await;
        }

        let status = StatusMessage::post(&self.api, chat_id, lang)
            .await
            .context("Failed to post status message")?;
        let request = Request::new(url, user_id, chat_id);

        let formats = match self
            .dispatcher
            .formats(&request, &ProgressReporter::detached())
            .await
        {
            Ok(formats) => formats,
            Err(e) => {
                warn!(url, user_id, transient = e.is_transient(), "Failed to list formats: {e}");
                let sent = self
                    .reply(
                        chat_id,
                        &tf(lang, Msg::DownloadFailed, &[("error", &describe_error(lang, &e))]),
                    )
                    .await;
                status.finish().await;
                return sent;
            }
        };

        if formats.is_empty() || settings.default_quality == DefaultQuality::Best {
            return self.run_download(request, FormatChoice::Best, status, lang).await;
        }

        self.pending.insert(user_id, request.url.clone()).await;
        status
            .set_text(
                &t(lang, Msg::SelectQuality),
                Some(&keyboards::format_keyboard(lang, &formats)),
            )
            .await
            .context("Failed to show format keyboard")?;
        Ok(())
    }

    /// Run a request to completion, reporting progress through `status`.
    async fn run_download(
        &self,
        request: Request,
        choice: FormatChoice,
        mut status: StatusMessage,
        lang: Language,
    ) -> Result<()> {
        let (progress, updates) = ProgressReporter::channel();
        status.follow(updates);

        let delivery = TelegramDelivery::new(self.api.clone(), request.chat_id);
        let result = self
            .dispatcher
            .process(&request, &choice, &progress, &delivery)
            .await;
        drop(progress);

        let failure = match result {
            Ok(()) => None,
            Err(ProcessError::Download(e)) => {
                warn!(
                    url = %request.url,
                    user_id = request.user_id,
                    transient = e.is_transient(),
                    "Download failed: {e}"
                );
                Some(tf(
                    lang,
                    Msg::DownloadFailed,
                    &[("error", &describe_error(lang, &e))],
                ))
            }
            Err(e) => {
                error!(url = %request.url, user_id = request.user_id, "{e:#}");
                Some(t(lang, Msg::ErrorOccurred))
            }
        };

        let sent = match failure {
            Some(text) => self.reply(request.chat_id, &text).await,
            None => Ok(()),
        };
        status.finish().await;
        sent
    }

    // ========== Callbacks ==========

    async fn handle_callback(&self, query: CallbackQuery) -> Result<()> {
        if let Err(e) = self.api.answer_callback_query(&query.id, None).await {
            debug!("Failed to answer callback query: {e}");
        }

        // Inline-message callbacks carry no message and are not produced by the bot
        let Some(message) = query.message.as_ref() else {
            return Ok(());
        };
        let Some(action) = query.data.as_deref().and_then(CallbackAction::parse) else {
            debug!(data = ?query.data, "Ignoring unknown callback data");
            return Ok(());
        };

        let user = &query.from;
        self.record_profile(user).await;
        let settings = db::effective_settings(self.db.pool(), user.id, message.chat.id).await?;

        if let Err(e) = self.handle_callback_action(action, user, message, &settings).await {
            error!(user_id = user.id, chat_id = message.chat.id, "Callback failed: {e:#}");
            self.edit(message, &t(settings.language, Msg::ErrorOccurred), None)
                .await?;
        }
        Ok(())
    }

    async fn handle_callback_action(
        &self,
        action: CallbackAction,
        user: &User,
        message: &Message,
        settings: &EffectiveSettings,
    ) -> Result<()> {
        let lang = settings.language;

        match action {
            CallbackAction::Quality(value) => {
                let Some(url) = self.pending.take(user.id).await else {
                    return self.edit(message, &t(lang, Msg::SessionExpired), None).await;
                };

                // The keyboard message becomes the status message
                let status =
                    StatusMessage::existing(&self.api, message.chat.id, message.message_id, lang);
                status
                    .set_text(&t(lang, Msg::Processing), None)
                    .await
                    .context("Failed to update status message")?;

                let request = Request::new(url, user.id, message.chat.id);
                self.run_download(request, FormatChoice::parse(&value), status, lang)
                    .await
            }
            CallbackAction::Settings(section) => match section.as_str() {
                "language" => {
                    self.edit(
                        message,
                        &t(lang, Msg::SelectLanguage),
                        Some(&keyboards::language_keyboard(lang)),
                    )
                    .await
                }
                "quality" => {
                    self.edit(
                        message,
                        &t(lang, Msg::SelectDefaultQuality),
                        Some(&keyboards::quality_keyboard(lang)),
                    )
                    .await
                }
                "back" => self.show_settings_menu(message, settings).await,
                other => {
                    debug!(section = other, "Unknown settings section");
                    Ok(())
                }
            },
            CallbackAction::SetLanguage(language) => {
                let updated = self
                    .apply_settings(user.id, &message.chat, Some(language), None)
                    .await?;

                // Re-send the reply keyboard so its labels switch language
                if message.chat.is_private() {
                    self.api
                        .send_message(
                            message.chat.id,
                            &t(updated.language, Msg::Welcome),
                            Some(&keyboards::main_keyboard(updated.language)),
                        )
                        .await
                        .context("Failed to send main keyboard")?;
                }
                self.show_settings_menu(message, &updated).await
            }
            CallbackAction::SetQuality(quality) => {
                let updated = self
                    .apply_settings(user.id, &message.chat, None, Some(quality))
                    .await?;
                self.show_settings_menu(message, &updated).await
            }
        }
    }

    /// Store a settings change. Group admins change the group's settings,
    /// everyone else their own.
    async fn apply_settings(
        &self,
        user_id: i64,
        chat: &Chat,
        language: Option<Language>,
        quality: Option<DefaultQuality>,
    ) -> Result<EffectiveSettings> {
        let pool = self.db.pool();

        if !chat.is_private() && self.is_chat_admin(chat.id, user_id).await {
            let group =
                db::upsert_group_settings(pool, chat.id, user_id, language, quality).await?;
            info!(group_id = chat.id, admin_id = user_id, "Updated group settings");
            return Ok(EffectiveSettings::from(&group));
        }

        let mut updated = None;
        if let Some(language) = language {
            updated = Some(db::update_user_language(pool, user_id, language).await?);
        }
        if let Some(quality) = quality {
            updated = Some(db::update_user_quality(pool, user_id, quality).await?);
        }
        let user = match updated {
            Some(user) => user,
            None => db::get_or_create_user_settings(pool, user_id).await?,
        };
        info!(user_id, language = %user.language, quality = %user.default_quality, "Updated user settings");
        Ok(EffectiveSettings::from(&user))
    }

    async fn is_chat_admin(&self, chat_id: i64, user_id: i64) -> bool {
        match self.api.get_chat_member(chat_id, user_id).await {
            Ok(member) => member.is_admin(),
            Err(e) => {
                warn!(chat_id, user_id, "Failed to look up chat member: {e}");
                false
            }
        }
    }

    // ========== Inline queries and payments ==========

    async fn handle_inline_query(&self, query: InlineQuery) -> Result<()> {
        let text = query.query.trim();
        if text.is_empty() {
            return Ok(());
        }

        let lang = db::get_user_settings(self.db.pool(), query.from.id)
            .await?
            .map(|s| s.language())
            .unwrap_or_default();

        let article = InlineQueryResultArticle::new(
            format!("{:032x}", rand::random::<u128>()),
            t(lang, Msg::InlineTitle),
            tf(lang, Msg::InlineDescription, &[("url", text)]),
            format!("/zen {text}"),
        );
        self.api
            .answer_inline_query(&query.id, &[article])
            .await
            .context("Failed to answer inline query")?;
        Ok(())
    }

    async fn handle_pre_checkout(&self, query: PreCheckoutQuery) -> Result<()> {
        if query.invoice_payload == DONATE_PAYLOAD {
            self.api
                .answer_pre_checkout_query(&query.id, true, None)
                .await
                .context("Failed to approve pre-checkout query")?;
            return Ok(());
        }

        warn!(
            user_id = query.from.id,
            payload = %query.invoice_payload,
            "Rejecting pre-checkout query with unknown payload"
        );
        let lang = db::get_user_settings(self.db.pool(), query.from.id)
            .await?
            .map(|s| s.language())
            .unwrap_or_default();
        self.api
            .answer_pre_checkout_query(&query.id, false, Some(&t(lang, Msg::ErrorOccurred)))
            .await
            .context("Failed to reject pre-checkout query")?;
        Ok(())
    }

    async fn send_donation_invoice(&self, chat_id: i64, lang: Language) -> Result<()> {
        let prices = [LabeledPrice {
            label: t(lang, Msg::PriceLabel),
            amount: i64::from(DONATE_AMOUNT_STARS),
        }];
        self.api
            .send_invoice(
                chat_id,
                &t(lang, Msg::InvoiceTitle),
                &t(lang, Msg::InvoiceDescription),
                DONATE_PAYLOAD,
                STARS_CURRENCY,
                &prices,
            )
            .await
            .context("Failed to send donation invoice")?;
        Ok(())
    }

    // ========== Helpers ==========

    async fn send_settings(&self, chat_id: i64, settings: &EffectiveSettings) -> Result<()> {
        self.api
            .send_message(
                chat_id,
                &keyboards::settings_text(settings),
                Some(&keyboards::settings_keyboard(settings.language)),
            )
            .await
            .context("Failed to send settings menu")?;
        Ok(())
    }

    async fn show_settings_menu(&self, message: &Message, settings: &EffectiveSettings) -> Result<()> {
        self.edit(
            message,
            &keyboards::settings_text(settings),
            Some(&keyboards::settings_keyboard(settings.language)),
        )
        .await
    }

    async fn reply(&self, chat_id: i64, text: &str) -> Result<()> {
        self.api
            .send_message(chat_id, text, None)
            .await
            .context("Failed to send message")?;
        Ok(())
    }

    async fn edit(&self, message: &Message, text: &str, markup: Option<&ReplyMarkup>) -> Result<()> {
        match self
            .api
            .edit_message_text(message.chat.id, message.message_id, text, markup)
            .await
        {
            Err(e) if !e.is_not_modified() => Err(e).context("Failed to edit message"),
            _ => Ok(()),
        }
    }

    async fn record_profile(&self, user: &User) {
        let profile = UserProfile {
            username: user.username.clone(),
            first_name: Some(user.first_name.clone()),
            last_name: user.last_name.clone(),
            is_premium: user.is_premium.unwrap_or(false),
        };
        if let Err(e) = db::update_user_profile(self.db.pool(), user.id, &profile).await {
            warn!(user_id = user.id, "Failed to record user profile: {e:#}");
        }
    }
}
